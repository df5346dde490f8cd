//! End-to-end stitching of synthetic scroll sequences through the public API.

mod common;

use cap_stitch::Compositor;
use common::{scrolled, window};
use proptest::prelude::*;
use scroll_capture::{
    OverlapConfig, OverlapKind, OverlapResult, SmallOverlapPolicy, overlap, stitch_frames,
};

fn keep_small() -> OverlapConfig {
    OverlapConfig::default().with_small_overlap(SmallOverlapPolicy::Keep)
}

#[test]
fn test_shifted_pair_overlaps_by_shared_band() {
    let frames = scrolled(800, 600, &[0, 100], 11);

    let found = overlap(&frames[0], &frames[1]).unwrap();
    assert_eq!(found.kind, OverlapKind::Matched);
    assert!(found.overlap_rows.abs_diff(500) <= 4, "{:?}", found);
    assert!(found.similarity > 0.65);

    let output = stitch_frames(&frames, &OverlapConfig::default()).unwrap();
    assert_eq!(output.image.height, 1200 - found.overlap_rows);
    assert_eq!(output.image.height, 700);
    assert_eq!(output.image.width, 800);
}

#[test]
fn test_identical_frames_collapse_to_one() {
    let frame = window(400, 1000, 0, 12);
    let frames = vec![frame.clone(), frame.with_index(1)];

    let output = stitch_frames(&frames, &OverlapConfig::default()).unwrap();
    assert_eq!(output.overlaps[0].overlap_rows, 1000);
    assert!(output.overlaps[0].is_duplicate());
    assert_eq!(output.image.height, 1000);
    assert_eq!(output.plan.skipped_frames(), 1);
    assert_eq!(output.plan.entries[0].rows(), 0);
    assert_eq!(output.image.bytes(), frame.bytes());
}

#[test]
fn test_three_frames_with_known_overlaps() {
    // Offsets 0, 700, 1450: overlaps 200 and 150.
    let frames = scrolled(120, 900, &[0, 700, 1450], 13);
    let overlaps = vec![
        OverlapResult {
            top_index: 0,
            bottom_index: 1,
            overlap_rows: 200,
            similarity: 1.0,
            kind: OverlapKind::Matched,
        },
        OverlapResult {
            top_index: 1,
            bottom_index: 2,
            overlap_rows: 150,
            similarity: 1.0,
            kind: OverlapKind::Matched,
        },
    ];
    let image = Compositor::new().stitch(&frames, &overlaps).unwrap();
    assert_eq!(image.height, 2350);
    assert_eq!(image.bytes(), window(120, 2350, 0, 13).bytes());

    // The search finds the same overlaps once small overlaps are kept.
    let output = stitch_frames(&frames, &keep_small()).unwrap();
    let rows: Vec<u32> = output.overlaps.iter().map(|o| o.overlap_rows).collect();
    assert_eq!(rows, vec![200, 150]);
    assert_eq!(output.image.height, 2350);
}

#[test]
fn test_small_overlap_forced_duplicate_by_default() {
    let frames = scrolled(120, 900, &[0, 750], 14);
    let output = stitch_frames(&frames, &OverlapConfig::default()).unwrap();
    assert!(output.overlaps[0].is_duplicate());
    assert_eq!(output.image.height, 900);

    let kept = stitch_frames(&frames, &keep_small()).unwrap();
    assert_eq!(kept.overlaps[0].overlap_rows, 150);
    assert_eq!(kept.image.height, 1650);
}

#[test]
fn test_unrelated_frames_stack_in_full() {
    let top = window(256, 400, 0, 15);
    let bottom = window(256, 400, 0, 16).with_index(1);

    let found = overlap(&top, &bottom).unwrap();
    assert!(found.overlap_rows <= 4, "{:?}", found);
    assert!(found.similarity < 0.65);

    let output = stitch_frames(&[top.clone(), bottom.clone()], &OverlapConfig::default()).unwrap();
    assert_eq!(output.image.height, 800);
    let split = top.bytes().len();
    assert_eq!(&output.image.bytes()[..split], top.bytes());
    assert_eq!(&output.image.bytes()[split..], bottom.bytes());
}

#[test]
fn test_duplicate_run_collapses_to_last_frame() {
    let page = window(64, 200, 0, 17);
    let frames: Vec<_> = (0..4).map(|i| page.with_index(i)).collect();
    let output = stitch_frames(&frames, &OverlapConfig::default()).unwrap();
    assert_eq!(output.image.height, 200);
    assert_eq!(output.image.bytes(), page.bytes());
}

#[test]
fn test_width_mismatch_is_an_error() {
    let frames = vec![window(64, 100, 0, 18), window(48, 100, 0, 18).with_index(1)];
    let err = stitch_frames(&frames, &OverlapConfig::default()).unwrap_err();
    assert_eq!(err.category(), "dimension_mismatch");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_scroll_reassembles_the_page(shifts in proptest::collection::vec(40u32..=260, 1..4)) {
        let mut offsets = vec![0u32];
        for shift in &shifts {
            offsets.push(offsets[offsets.len() - 1] + shift);
        }
        let frames = scrolled(96, 300, &offsets, 19);
        let output = stitch_frames(&frames, &keep_small()).unwrap();

        let page_height = 300 + offsets[offsets.len() - 1];
        prop_assert_eq!(output.image.height, page_height);
        let expected = window(96, page_height, 0, 19);
        prop_assert_eq!(output.image.bytes(), expected.bytes());
    }
}
