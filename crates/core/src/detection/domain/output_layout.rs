use crate::inference::domain::inference_backend::NetworkInfo;
use crate::inference::domain::inference_error::ModelLoadError;
use crate::shared::constants::{NUM_CLASSES_METADATA_KEY, SSD_OBJECT_SIZE};

/// Validated shape of an SSD `DetectionOutput` tensor `[1, 1, N, 7]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    /// `N`, or `None` when the model leaves it dynamic and the output
    /// buffer length decides.
    pub max_proposal_count: Option<usize>,
    pub object_size: usize,
    pub num_classes: usize,
}

impl OutputLayout {
    /// Checks that the network is a single-input, single-output SSD detector.
    pub fn from_network(info: &NetworkInfo) -> Result<Self, ModelLoadError> {
        let network = || info.name.clone();

        if info.inputs.len() != 1 {
            return Err(ModelLoadError::InputCount {
                network: network(),
                count: info.inputs.len(),
            });
        }
        if info.outputs.len() != 1 {
            return Err(ModelLoadError::OutputCount {
                network: network(),
                count: info.outputs.len(),
            });
        }

        let num_classes = info.num_classes.ok_or(ModelLoadError::MissingAttribute {
            network: network(),
            attribute: NUM_CLASSES_METADATA_KEY,
        })?;

        let dims = &info.outputs[0].dims;
        if dims.len() != 4 {
            return Err(ModelLoadError::OutputRank {
                network: network(),
                rank: dims.len(),
            });
        }
        if dims[3] != SSD_OBJECT_SIZE as i64 {
            return Err(ModelLoadError::ObjectSize {
                network: network(),
                expected: SSD_OBJECT_SIZE,
                actual: dims[3],
            });
        }
        if dims[2] == 0 {
            return Err(ModelLoadError::ProposalCount {
                network: network(),
                value: dims[2],
            });
        }

        Ok(Self {
            max_proposal_count: (dims[2] > 0).then_some(dims[2] as usize),
            object_size: SSD_OBJECT_SIZE,
            num_classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::domain::inference_backend::TensorInfo;
    use rstest::rstest;

    fn tensor(dims: &[i64]) -> TensorInfo {
        TensorInfo {
            name: "t".to_string(),
            dims: dims.to_vec(),
        }
    }

    fn ssd_info(output_dims: &[i64]) -> NetworkInfo {
        NetworkInfo {
            name: "Face Detection".to_string(),
            inputs: vec![tensor(&[1, 3, 300, 300])],
            outputs: vec![tensor(output_dims)],
            num_classes: Some(2),
        }
    }

    #[test]
    fn test_valid_ssd_output() {
        let layout = OutputLayout::from_network(&ssd_info(&[1, 1, 200, 7])).unwrap();
        assert_eq!(layout.max_proposal_count, Some(200));
        assert_eq!(layout.object_size, 7);
        assert_eq!(layout.num_classes, 2);
    }

    #[test]
    fn test_two_inputs_rejected() {
        let mut info = ssd_info(&[1, 1, 200, 7]);
        info.inputs.push(tensor(&[1]));
        let err = OutputLayout::from_network(&info).unwrap_err();
        assert!(matches!(err, ModelLoadError::InputCount { count: 2, .. }));
    }

    #[test]
    fn test_no_outputs_rejected() {
        let mut info = ssd_info(&[1, 1, 200, 7]);
        info.outputs.clear();
        let err = OutputLayout::from_network(&info).unwrap_err();
        assert!(matches!(err, ModelLoadError::OutputCount { count: 0, .. }));
    }

    #[test]
    fn test_missing_num_classes_rejected() {
        let mut info = ssd_info(&[1, 1, 200, 7]);
        info.num_classes = None;
        let err = OutputLayout::from_network(&info).unwrap_err();
        assert!(err.to_string().contains("num_classes"));
        assert!(err.to_string().contains("Face Detection"));
    }

    #[rstest]
    #[case::rank_three(&[1, 200, 7])]
    #[case::rank_five(&[1, 1, 1, 200, 7])]
    fn test_wrong_rank_rejected(#[case] dims: &[i64]) {
        let err = OutputLayout::from_network(&ssd_info(dims)).unwrap_err();
        assert!(matches!(err, ModelLoadError::OutputRank { .. }));
    }

    #[test]
    fn test_wrong_object_size_rejected() {
        let err = OutputLayout::from_network(&ssd_info(&[1, 1, 200, 6])).unwrap_err();
        assert!(matches!(err, ModelLoadError::ObjectSize { actual: 6, .. }));
    }

    #[test]
    fn test_dynamic_proposal_count_is_unbounded() {
        let layout = OutputLayout::from_network(&ssd_info(&[1, 1, -1, 7])).unwrap();
        assert_eq!(layout.max_proposal_count, None);
    }

    #[test]
    fn test_zero_proposals_rejected() {
        let err = OutputLayout::from_network(&ssd_info(&[1, 1, 0, 7])).unwrap_err();
        assert!(matches!(err, ModelLoadError::ProposalCount { value: 0, .. }));
    }
}
