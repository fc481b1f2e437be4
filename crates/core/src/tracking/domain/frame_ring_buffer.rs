use std::collections::VecDeque;

use crate::shared::frame::GrayImage;

/// A grayscale frame with its stream position.
#[derive(Clone, Debug)]
pub struct BufferedFrame {
    pub index: usize,
    pub gray: GrayImage,
}

impl BufferedFrame {
    pub fn new(index: usize, gray: GrayImage) -> Self {
        Self { index, gray }
    }
}

/// Frames observed while a detection request is outstanding, oldest first.
///
/// Before a tracking pass the submission frame is pushed to the front and
/// the harvest frame to the back; the buffer is cleared afterwards.
/// Pushing past capacity evicts from the opposite end.
#[derive(Debug)]
pub struct FrameRingBuffer {
    frames: VecDeque<BufferedFrame>,
    capacity: usize,
}

impl FrameRingBuffer {
    /// `capacity` is raised to 2, the smallest buffer holding one pair.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push_back(&mut self, frame: BufferedFrame) {
        if self.is_full() {
            log::warn!("Frame buffer full ({} frames), dropping the oldest frame", self.capacity);
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn push_front(&mut self, frame: BufferedFrame) {
        if self.is_full() {
            log::warn!("Frame buffer full ({} frames), dropping the newest frame", self.capacity);
            self.frames.pop_back();
        }
        self.frames.push_front(frame);
    }

    /// Calls `f(prev, next)` for every adjacent pair, oldest first.
    pub fn for_each_consecutive_pair<F>(&self, mut f: F)
    where
        F: FnMut(&BufferedFrame, &BufferedFrame),
    {
        for (prev, next) in self.frames.iter().zip(self.frames.iter().skip(1)) {
            f(prev, next);
        }
    }

    pub fn pop_back(&mut self) -> Option<BufferedFrame> {
        self.frames.pop_back()
    }

    /// Frame at `position` from the front.
    pub fn get(&self, position: usize) -> Option<&BufferedFrame> {
        self.frames.get(position)
    }

    pub fn back(&self) -> Option<&BufferedFrame> {
        self.frames.back()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }
}
