use std::path::Path;

use anyhow::Context;
use shardgrid_core::{AllocationSettings, ClusterSnapshot, ShardId};
use shardgrid_decision::{RenderOptions, encode_frame, render_text};

pub struct ExplainArgs<'a> {
    pub snapshot: &'a str,
    pub index: &'a str,
    pub shard: u32,
    pub primary: bool,
    pub config: Option<&'a str>,
    pub format: &'a str,
    pub include_yes_decisions: bool,
}

pub fn explain(args: &ExplainArgs<'_>) -> anyhow::Result<()> {
    let output = render_explain(args)?;
    println!("{output}");
    Ok(())
}

fn render_explain(args: &ExplainArgs<'_>) -> anyhow::Result<String> {
    let snapshot = ClusterSnapshot::from_file(Path::new(args.snapshot))
        .with_context(|| format!("loading snapshot {}", args.snapshot))?;
    let settings = match args.config {
        Some(path) => AllocationSettings::from_file(Path::new(path))
            .with_context(|| format!("loading settings {path}"))?,
        None => AllocationSettings::default(),
    };

    let shard_id = ShardId::new(args.index, args.shard);
    let decision = shardgrid_placement::explain_shard(&snapshot, &shard_id, args.primary, &settings)?;
    let opts = RenderOptions {
        include_yes_decisions: args.include_yes_decisions,
    };

    match args.format {
        "text" => Ok(render_text(&decision, &opts)),
        "json" => Ok(serde_json::to_string_pretty(&decision.to_json(&opts))?),
        "wire" => Ok(hex::encode(encode_frame(&decision))),
        other => anyhow::bail!("unknown format '{other}' (expected text, json or wire)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
  "now_ms": 0,
  "nodes": [
    { "node": { "id": "n1", "name": "alpha", "address": "10.0.0.1:9300" },
      "disk_total_bytes": 1000, "disk_used_bytes": 100 },
    { "node": { "id": "n2", "name": "beta", "address": "10.0.0.2:9300",
                "attributes": { "zone": "b" } },
      "disk_total_bytes": 1000, "disk_used_bytes": 100 }
  ],
  "shards": [
    { "shard_id": { "index": "logs", "shard": 0 }, "primary": true,
      "state": "started", "current_node": "n1" },
    { "shard_id": { "index": "logs", "shard": 0 }, "primary": false,
      "state": "unassigned",
      "unassigned_info": { "reason": "replica_added" } }
  ]
}"#;

    fn write_snapshot(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("cluster.json");
        std::fs::write(&path, SNAPSHOT).unwrap();
        path.display().to_string()
    }

    fn args<'a>(snapshot: &'a str, format: &'a str) -> ExplainArgs<'a> {
        ExplainArgs {
            snapshot,
            index: "logs",
            shard: 0,
            primary: false,
            config: None,
            format,
            include_yes_decisions: false,
        }
    }

    #[test]
    fn test_json_output_for_unassigned_replica() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_snapshot(&dir);
        let out = render_explain(&args(&snapshot, "json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(json.get("move_decision").is_none());
        let allocate = &json["allocate_decision"];
        assert_eq!(allocate["can_allocate"], "yes");
        assert_eq!(allocate["target_node"]["node_id"], "n2");
        assert_eq!(allocate["node_allocation_decisions"][0]["node_id"], "n2");
        assert_eq!(allocate["node_allocation_decisions"][1]["deciders"][0]["decider"], "same_shard");
    }

    #[test]
    fn test_text_output_for_primary() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_snapshot(&dir);
        let mut a = args(&snapshot, "text");
        a.primary = true;
        let out = render_explain(&a).unwrap();
        assert!(out.starts_with("Move decision"));
        assert!(out.contains("Can remain:   yes"));
    }

    #[test]
    fn test_config_filters_apply() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_snapshot(&dir);
        let config = dir.path().join("shardgrid.toml");
        std::fs::write(&config, "[require]\nzone = \"a\"\n").unwrap();
        let config = config.display().to_string();
        let mut a = args(&snapshot, "json");
        a.config = Some(&config);
        let out = render_explain(&a).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["allocate_decision"]["can_allocate"], "no");
        assert_eq!(json["allocate_decision"]["allocation_status"], "deciders_no");
    }

    #[test]
    fn test_wire_output_is_framed_hex() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_snapshot(&dir);
        let out = render_explain(&args(&snapshot, "wire")).unwrap();
        // "SGAD" magic.
        assert!(out.starts_with("53474144"));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_snapshot(&dir);
        let err = render_explain(&args(&snapshot, "yaml")).unwrap_err();
        assert!(err.to_string().contains("unknown format"));
    }

    #[test]
    fn test_missing_snapshot_reports_path() {
        let err = render_explain(&args("/nonexistent/cluster.json", "text")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/cluster.json"));
    }

    #[test]
    fn test_unknown_shard_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_snapshot(&dir);
        let mut a = args(&snapshot, "text");
        a.index = "metrics";
        assert!(render_explain(&a).is_err());
    }
}
