//! One-sided transfer scenarios: flat and strided, local and remote paths.

use std::sync::Arc;

use weft_runtime::runtime::{EndCount, LocaleId, Runtime, StridedSpec};
use weft_runtime::{CommError, RuntimeConfig, RuntimeError};

fn runtime(locales: u16) -> Runtime {
    Runtime::with_config(RuntimeConfig {
        num_locales: locales,
        workers_per_locale: 2,
        ..RuntimeConfig::default()
    })
    .unwrap()
}

#[test]
fn flat_put_then_get_round_trip() {
    let rt = runtime(2);
    let remote = rt.alloc_on(LocaleId(1), 64).unwrap();

    let payload: Vec<u8> = (0..64).collect();
    rt.put(remote, &payload).unwrap();

    let mut back = vec![0u8; 64];
    rt.get(&mut back, remote).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn put_at_offset() {
    let rt = runtime(2);
    let remote = rt.alloc_on(LocaleId(1), 16).unwrap();

    rt.put(remote.at(4), &[1, 2, 3, 4]).unwrap();

    let mut back = vec![0u8; 16];
    rt.get(&mut back, remote).unwrap();
    assert_eq!(back, [0, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn local_and_remote_paths_agree() {
    // The same logical transfer through the locality shortcut (owner ==
    // here) and through the daemon must be byte-identical.
    let rt = runtime(2);
    let payload: Vec<u8> = (0..32).map(|i| i * 3).collect();

    let local = rt.alloc_on(LocaleId(0), 32).unwrap();
    let remote = rt.alloc_on(LocaleId(1), 32).unwrap();
    rt.put(local, &payload).unwrap();
    rt.put(remote, &payload).unwrap();

    let mut via_local = vec![0u8; 32];
    let mut via_remote = vec![0u8; 32];
    rt.get(&mut via_local, local).unwrap();
    rt.get(&mut via_remote, remote).unwrap();

    assert_eq!(via_local, via_remote);
    assert_eq!(via_local, payload);
}

#[test]
fn strided_put_2d_reshape() {
    // Source 4 rows x 2 cols, row stride 6; destination 2 rows x 4 cols,
    // row stride 5. Eight elements each side; the k-th source element in
    // row-major order lands at the k-th destination position.
    let rt = runtime(2);
    let src_spec = StridedSpec::new(0, 1, &[(6, 4), (1, 2)]);
    let dst_spec = StridedSpec::new(0, 1, &[(5, 2), (1, 4)]);

    let mut src = vec![0u8; 24];
    for (k, off) in src_spec.offsets().enumerate() {
        src[off] = (k + 1) as u8;
    }

    let remote = rt.alloc_on(LocaleId(1), 10).unwrap();
    rt.put_strided(remote, &dst_spec, &src, &src_spec).unwrap();

    let mut dst = vec![0u8; 10];
    rt.get(&mut dst, remote).unwrap();
    let landed: Vec<u8> = dst_spec.offsets().map(|off| dst[off]).collect();
    assert_eq!(landed, vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn strided_get_matches_flat_reference() {
    // getStrided must agree with a flatten-then-copy reference: pack the
    // region locally after a flat get of the whole segment.
    let rt = runtime(2);
    let remote = rt.alloc_on(LocaleId(1), 48).unwrap();
    let content: Vec<u8> = (0..48).map(|i| i ^ 0x5a).collect();
    rt.put(remote, &content).unwrap();

    let spec = StridedSpec::new(2, 2, &[(12, 3), (4, 2)]);

    // Reference: flat get, then local gather.
    let mut whole = vec![0u8; 48];
    rt.get(&mut whole, remote).unwrap();
    let reference = spec.pack(&whole);

    // Strided get straight into a packed-layout destination.
    let packed_spec = StridedSpec::new(0, 2, &[(2, 6)]);
    let mut packed = vec![0u8; packed_spec.required_len().unwrap()];
    rt.get_strided(&mut packed, &packed_spec, remote, &spec)
        .unwrap();

    assert_eq!(packed, reference);
}

#[test]
fn strided_local_and_remote_paths_agree() {
    let rt = runtime(2);
    let spec = StridedSpec::new(1, 1, &[(7, 3), (2, 3)]);
    let content: Vec<u8> = (0..32).map(|i: u8| i.wrapping_mul(17)).collect();

    let local = rt.alloc_on(LocaleId(0), 32).unwrap();
    let remote = rt.alloc_on(LocaleId(1), 32).unwrap();
    rt.put(local, &content).unwrap();
    rt.put(remote, &content).unwrap();

    let out_spec = StridedSpec::new(0, 1, &[(1, 9)]);
    let mut via_local = vec![0u8; 9];
    let mut via_remote = vec![0u8; 9];
    rt.get_strided(&mut via_local, &out_spec, local, &spec)
        .unwrap();
    rt.get_strided(&mut via_remote, &out_spec, remote, &spec)
        .unwrap();

    assert_eq!(via_local, via_remote);
}

#[test]
fn transfers_from_worker_tasks() {
    // get/put called from inside tasks block the task, not the pool.
    let rt = Arc::new(runtime(2));
    let remote = rt.alloc_on(LocaleId(1), 8).unwrap();

    let scope = EndCount::new();
    let rt2 = Arc::clone(&rt);
    rt.spawn(LocaleId(0), &scope, move || {
        rt2.put(remote, &[7u8; 8]).unwrap();
    })
    .unwrap();
    scope.wait();

    let mut back = vec![0u8; 8];
    rt.get(&mut back, remote).unwrap();
    assert_eq!(back, [7u8; 8]);
}

#[test]
fn shape_mismatch_is_rejected() {
    let rt = runtime(2);
    let remote = rt.alloc_on(LocaleId(1), 32).unwrap();

    let src_spec = StridedSpec::new(0, 1, &[(1, 8)]);
    let dst_spec = StridedSpec::new(0, 1, &[(1, 9)]);
    let err = rt
        .put_strided(remote, &dst_spec, &[0u8; 8], &src_spec)
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Comm(CommError::ShapeMismatch { .. })
    ));
}

#[test]
fn oversized_transfer_is_rejected() {
    let rt = runtime(2);
    let remote = rt.alloc_on(LocaleId(1), 8).unwrap();

    let err = rt.put(remote, &[0u8; 16]).unwrap_err();
    assert!(matches!(err, RuntimeError::Comm(CommError::Mem(_))));

    // The descriptor is validated in full before any byte moves.
    let spec = StridedSpec::new(0, 1, &[(4, 4)]);
    let err = rt
        .put_strided(remote, &spec, &[1u8; 16], &StridedSpec::new(0, 1, &[(1, 4)]))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Comm(_)));

    let mut untouched = vec![0u8; 8];
    rt.get(&mut untouched, remote).unwrap();
    assert_eq!(untouched, [0u8; 8]);
}

#[test]
fn free_then_access_is_an_error() {
    let rt = runtime(1);
    let handle = rt.alloc_on(LocaleId(0), 8).unwrap();
    rt.free(handle).unwrap();

    let err = rt.get(&mut [0u8; 4], handle).unwrap_err();
    assert!(matches!(err, RuntimeError::Comm(CommError::Mem(_))));
}
