use anyhow::Context;
use shardgrid_decision::{RenderOptions, ShardAllocationDecision, decode_frame, render_text};
use tracing::debug;

pub fn decode(hex_input: &str, format: &str, include_yes_decisions: bool) -> anyhow::Result<()> {
    let output = render_decoded(hex_input, format, include_yes_decisions)?;
    println!("{output}");
    Ok(())
}

fn render_decoded(hex_input: &str, format: &str, include_yes_decisions: bool) -> anyhow::Result<String> {
    let bytes = hex::decode(hex_input.trim()).context("input is not valid hex")?;
    debug!(len = bytes.len(), "decoding explain frame");
    let decision: ShardAllocationDecision = decode_frame(&bytes).context("malformed explain frame")?;
    let opts = RenderOptions {
        include_yes_decisions,
    };

    match format {
        "text" => Ok(render_text(&decision, &opts)),
        "json" => Ok(serde_json::to_string_pretty(&decision.to_json(&opts))?),
        other => anyhow::bail!("unknown format '{other}' (expected text or json)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardgrid_core::DiscoveryNode;
    use shardgrid_decision::{
        AllocateUnassignedDecision, Decision, MoveDecision, NodeAllocationResult, encode_frame,
    };

    fn sample_hex() -> String {
        let node = DiscoveryNode::new("n2", "beta", "10.0.0.2:9300");
        let results = vec![NodeAllocationResult::new(
            node.clone(),
            Decision::multi([Decision::yes("filter", "node passes require/exclude filters")]),
            1,
        )];
        let decision = ShardAllocationDecision::unassigned(AllocateUnassignedDecision::yes(
            node,
            Some("alloc-1".to_string()),
            results,
            true,
        ));
        hex::encode(encode_frame(&decision))
    }

    #[test]
    fn test_decode_to_json() {
        let out = render_decoded(&sample_hex(), "json", false).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["allocate_decision"]["can_allocate"], "yes");
        assert_eq!(json["allocate_decision"]["allocation_id"], "alloc-1");
        // YES deciders are hidden by default.
        assert!(json["allocate_decision"]["node_allocation_decisions"][0].get("deciders").is_none());
    }

    #[test]
    fn test_decode_includes_yes_deciders_on_request() {
        let out = render_decoded(&sample_hex(), "json", true).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        let deciders = &json["allocate_decision"]["node_allocation_decisions"][0]["deciders"];
        assert_eq!(deciders[0]["decider"], "filter");
    }

    #[test]
    fn test_decode_to_text() {
        let hex_input = hex::encode(encode_frame(&ShardAllocationDecision::assigned(MoveDecision::stay(
            Decision::ALWAYS,
        ))));
        let out = render_decoded(&format!("  {hex_input}\n"), "text", false).unwrap();
        assert!(out.starts_with("Move decision"));
    }

    #[test]
    fn test_rejects_bad_hex() {
        let err = render_decoded("zz", "text", false).unwrap_err();
        assert!(err.to_string().contains("not valid hex"));
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let hex_input = sample_hex();
        let err = render_decoded(&hex_input[..hex_input.len() - 4], "text", false).unwrap_err();
        assert!(err.to_string().contains("malformed explain frame"));
    }
}
