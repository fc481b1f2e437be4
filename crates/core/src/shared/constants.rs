/// Frames between detector submissions.
pub const DEFAULT_DETECTION_CADENCE: usize = 30;

/// Default detection confidence threshold.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Side multiplier applied when squaring detector boxes.
pub const DEFAULT_ENLARGE_COEFFICIENT: f64 = 1.2;

/// Feature points requested per detected face.
pub const DEFAULT_MAX_POINTS_PER_FACE: usize = 50;

/// Minimum corner response as a fraction of the strongest corner.
pub const DEFAULT_CORNER_QUALITY: f64 = 0.01;

/// Minimum pairwise distance between selected corners, in pixels.
pub const DEFAULT_MIN_CORNER_DISTANCE: f64 = 10.0;

/// Neighbourhood used for the corner structure tensor.
pub const DEFAULT_CORNER_BLOCK_SIZE: usize = 3;

/// Maximum forward-backward error (L∞, pixels) for a point to survive.
pub const DEFAULT_FB_TOLERANCE: f32 = 1.0;

/// Lucas-Kanade integration window side, in pixels.
pub const DEFAULT_FLOW_WINDOW: usize = 9;

pub const DEFAULT_FLOW_ITERATIONS: usize = 10;

pub const DEFAULT_FLOW_EPSILON: f32 = 0.03;

/// Pyramid levels above the base image (0 = single level).
pub const DEFAULT_PYRAMID_LEVELS: usize = 3;

/// Record width of an SSD `DetectionOutput` proposal:
/// `[image_id, label, confidence, x1, y1, x2, y2]`.
pub const SSD_OBJECT_SIZE: usize = 7;

/// Label inserted for the implicit background class.
pub const BACKGROUND_LABEL: &str = "fake";

/// ONNX custom metadata key carrying the detector's class count.
pub const NUM_CLASSES_METADATA_KEY: &str = "num_classes";

/// Timing phase names reported to the pipeline logger.
pub const PHASE_DECODING: &str = "video frame decoding";
pub const PHASE_DETECTION: &str = "detection";
pub const PHASE_KEYPOINTS: &str = "keypoints";
pub const PHASE_TRACKER: &str = "tracker";
pub const PHASE_VISUALIZATION: &str = "visualization";
pub const PHASE_TOTAL: &str = "total";
