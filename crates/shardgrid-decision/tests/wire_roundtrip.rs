//! Randomized wire round-trip and invariant checks for explain records.

use proptest::prelude::*;
use shardgrid_core::DiscoveryNode;
use shardgrid_decision::*;

fn decision_type() -> impl Strategy<Value = DecisionType> {
    prop::sample::select(DecisionType::ALL.to_vec())
}

fn leaf() -> impl Strategy<Value = Decision> {
    (decision_type(), "[a-z_]{1,12}", "[a-z ]{0,24}", any::<bool>()).prop_map(
        |(ty, label, explanation, labelled)| {
            if labelled {
                Decision::single(ty, label, explanation)
            } else {
                match ty {
                    DecisionType::Yes => Decision::ALWAYS,
                    DecisionType::Throttle => Decision::THROTTLE,
                    DecisionType::No => Decision::NO,
                }
            }
        },
    )
}

/// Multi decisions nested one to three levels deep.
fn decision() -> impl Strategy<Value = Decision> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Decision::multi)
    })
}

fn node() -> impl Strategy<Value = DiscoveryNode> {
    (
        "n[0-9]{1,3}",
        "[a-z]{1,8}",
        prop::collection::btree_map("[a-z]{1,4}", "[a-z0-9]{1,4}", 0..3),
    )
        .prop_map(|(id, name, attributes)| {
            let mut n = DiscoveryNode::new(id, name, "10.0.0.1:9300");
            n.attributes = attributes;
            n
        })
}

fn node_result() -> impl Strategy<Value = NodeAllocationResult> {
    prop_oneof![
        (node(), decision(), 0u32..20)
            .prop_map(|(n, d, rank)| NodeAllocationResult::new(n, d, rank)),
        (
            node(),
            prop::sample::select(AllocationDecision::ALL.to_vec()),
            prop::option::of(decision()),
            0u32..20,
        )
            .prop_map(|(n, summary, d, rank)| NodeAllocationResult::with_node_decision(n, summary, d, rank)),
    ]
}

fn node_results() -> impl Strategy<Value = Vec<NodeAllocationResult>> {
    prop::collection::vec(node_result(), 0..5)
}

fn allocate_decision() -> impl Strategy<Value = AllocateUnassignedDecision> {
    prop_oneof![
        (prop::sample::select(AllocationStatus::ALL.to_vec()), node_results(), any::<bool>()).prop_map(
            |(status, results, reuse)| {
                if status == AllocationStatus::DelayedAllocation {
                    AllocateUnassignedDecision::delayed(1_000, 60_000, results)
                } else {
                    AllocateUnassignedDecision::no(status, results, reuse)
                }
            }
        ),
        node_results().prop_map(AllocateUnassignedDecision::throttle),
        (node(), prop::option::of("[a-z0-9]{8}"), node_results(), any::<bool>())
            .prop_map(|(n, id, results, reuse)| AllocateUnassignedDecision::yes(n, id, results, reuse)),
        (any::<u32>(), any::<u32>(), node_results()).prop_map(|(remaining, configured, results)| {
            AllocateUnassignedDecision::delayed(u64::from(remaining), u64::from(configured), results)
        }),
    ]
}

fn non_yes_decision() -> impl Strategy<Value = Decision> {
    decision().prop_filter("remain verdict must not be YES", |d| {
        d.decision_type() != DecisionType::Yes
    })
}

fn move_decision() -> impl Strategy<Value = MoveDecision> {
    let summary = || prop::sample::select(AllocationDecision::ALL.to_vec());
    prop_oneof![
        (non_yes_decision(), summary(), prop::option::of(node()), node_results())
            .prop_map(|(remain, s, target, results)| MoveDecision::cannot_remain(remain, s, target, results)),
        decision().prop_map(MoveDecision::stay),
        (
            decision(),
            decision(),
            summary(),
            prop::option::of(node()),
            node_results(),
            0u32..10,
        )
            .prop_map(|(remain, rebalance, s, target, results, rank)| {
                MoveDecision::rebalance(remain, rebalance, s, target, results, rank)
            }),
    ]
}

fn shard_decision() -> impl Strategy<Value = ShardAllocationDecision> {
    prop_oneof![
        allocate_decision().prop_map(ShardAllocationDecision::unassigned),
        move_decision().prop_map(ShardAllocationDecision::assigned),
    ]
}

proptest! {
    #[test]
    fn framed_round_trip_is_lossless(original in shard_decision()) {
        let bytes = encode_frame(&original);
        let decoded: ShardAllocationDecision = decode_frame(&bytes).unwrap();
        prop_assert_eq!(decoded, original);
    }

    #[test]
    fn exactly_one_branch_is_taken(d in shard_decision()) {
        prop_assert!(
            d.allocate_decision().is_decision_taken() != d.move_decision().is_decision_taken()
        );
    }

    #[test]
    fn multi_type_is_worst_child(children in prop::collection::vec(decision(), 0..6)) {
        let types: Vec<DecisionType> = children.iter().map(Decision::decision_type).collect();
        let multi = Decision::multi(children);
        let expected = if types.contains(&DecisionType::No) {
            DecisionType::No
        } else if types.contains(&DecisionType::Throttle) {
            DecisionType::Throttle
        } else {
            DecisionType::Yes
        };
        prop_assert_eq!(multi.decision_type(), expected);
    }

    #[test]
    fn node_results_are_in_explain_order(d in allocate_decision()) {
        for pair in d.node_results().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                (a.weight_ranking(), &a.node().id) <= (b.weight_ranking(), &b.node().id)
            );
        }
    }

    #[test]
    fn truncated_frames_never_panic(original in shard_decision(), cut in 0usize..64) {
        let bytes = encode_frame(&original);
        let cut = cut.min(bytes.len().saturating_sub(1));
        prop_assert!(decode_frame::<ShardAllocationDecision>(&bytes[..cut]).is_err());
    }

    #[test]
    fn garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = decode_frame::<ShardAllocationDecision>(&bytes);
        let _ = ShardAllocationDecision::read_from(&mut StreamInput::new(&bytes));
    }
}

/// `levels` multi wrappers around a single NO leaf, written by hand so the
/// encoder's own recursion is not involved.
fn nested_multi_bytes(levels: usize) -> Vec<u8> {
    let mut out = StreamOutput::new();
    for _ in 0..levels {
        out.write_bool(true);
        out.write_vint(1);
    }
    out.write_bool(false);
    out.write_enum(DecisionType::No);
    out.write_bool(false);
    out.write_bool(false);
    out.into_bytes().to_vec()
}

fn framed(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(10 + body.len());
    frame.extend_from_slice(&codec::FRAME_MAGIC);
    frame.extend_from_slice(&codec::WIRE_VERSION.to_be_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

#[test]
fn nesting_at_the_limit_decodes() {
    let mut expected = Decision::NO;
    for _ in 0..MAX_NESTING_DEPTH {
        expected = Decision::multi([expected]);
    }
    let bytes = nested_multi_bytes(MAX_NESTING_DEPTH);
    let back = Decision::read_from(&mut StreamInput::new(&bytes)).unwrap();
    assert_eq!(back, expected);
    assert_eq!(decode_frame::<Decision>(&framed(&bytes)).unwrap(), expected);
    assert_eq!(decode_frame::<Decision>(&encode_frame(&expected)).unwrap(), expected);
}

#[test]
fn nesting_past_the_limit_is_rejected() {
    let bytes = nested_multi_bytes(MAX_NESTING_DEPTH + 1);
    assert!(matches!(
        Decision::read_from(&mut StreamInput::new(&bytes)),
        Err(DecisionError::NestingTooDeep { limit: MAX_NESTING_DEPTH })
    ));
}

#[test]
fn hostile_nesting_fails_without_exhausting_the_stack() {
    let bytes = nested_multi_bytes(200_000);
    let err = decode_frame::<Decision>(&framed(&bytes)).unwrap_err();
    assert!(matches!(err, DecisionError::NestingTooDeep { .. }));
    assert!(err.to_string().contains("nesting"));
}

#[test]
fn sibling_multis_do_not_accumulate_depth() {
    let mut deep = Decision::NO;
    for _ in 0..MAX_NESTING_DEPTH - 1 {
        deep = Decision::multi([deep]);
    }
    let wide = Decision::multi((0..8).map(|_| deep.clone()));
    let frame = encode_frame(&wide);
    assert_eq!(decode_frame::<Decision>(&frame).unwrap(), wide);
}

#[test]
fn deciders_no_with_untaken_move_renders_allocate_only() {
    let d = ShardAllocationDecision::new(
        AllocateUnassignedDecision::no(AllocationStatus::DecidersNo, Vec::new(), false),
        MoveDecision::NOT_TAKEN,
    );
    let json = d.to_json(&RenderOptions::default());
    assert!(json.get("allocate_decision").is_some());
    assert!(json.get("move_decision").is_none());
    assert_eq!(d.move_decision().to_json(&RenderOptions::default()), serde_json::json!({}));
}
