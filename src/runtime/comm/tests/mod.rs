//! Communication layer unit tests


use crate::runtime::comm::{check_shapes, CommError, StridedSpec};

#[cfg(test)]
mod shape_tests {
    use super::*;

    #[test]
    fn test_matching_shapes_pass() {
        // 4x2 and 2x4 carry the same 8 elements.
        let a = StridedSpec::new(0, 1, &[(6, 4), (1, 2)]);
        let b = StridedSpec::new(0, 1, &[(5, 2), (1, 4)]);
        assert!(check_shapes(&a, &b).is_ok());
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let a = StridedSpec::new(0, 1, &[(4, 3)]);
        let b = StridedSpec::new(0, 1, &[(4, 4)]);
        let err = check_shapes(&a, &b).unwrap_err();
        assert!(matches!(err, CommError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_elem_size_mismatch_rejected() {
        let a = StridedSpec::new(0, 2, &[(4, 4)]);
        let b = StridedSpec::new(0, 4, &[(8, 4)]);
        let err = check_shapes(&a, &b).unwrap_err();
        assert!(matches!(err, CommError::ShapeMismatch { .. }));
    }
}
