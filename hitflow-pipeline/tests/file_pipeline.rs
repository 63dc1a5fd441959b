#![allow(clippy::uninlined_format_args)]
//! JSON-lines in, configured pipeline, JSON-lines out.

use std::io::Write;

use hitflow_core::{Event, Hit, HitCloud};
use hitflow_pipeline::{
    Error, EventReader, EventWriter, PipelineConfig, PipelineRunner, Result,
};
use hitflow_processes::ProcessRegistry;
use tempfile::{tempdir, NamedTempFile};

const CONFIG: &str = r#"{
    "workers": 3,
    "queueCapacity": 4,
    "flushSize": 2,
    "seed": 5,
    "processes": [
        { "type": "hitsReduction", "parameters": { "maxNodes": 5, "minimumDistance": "3 mm" } },
        { "type": "hitsAnalysis", "name": "summary" }
    ]
}"#;

fn line_event(id: u64, hits: u32) -> Event {
    let cloud: HitCloud = (0..hits)
        .map(|i| Hit::new(f64::from(i) * 0.5, 0.0, 0.0, 2.0))
        .collect();
    Event::hits(id, cloud)
}

#[test]
fn test_file_to_file_run() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.jsonl");
    let output = dir.path().join("out.jsonl");

    let mut writer = EventWriter::create(&input).unwrap();
    for id in 0..24 {
        let hits = if id % 5 == 0 { 0 } else { 40 };
        writer.write(&line_event(id, hits)).unwrap();
    }
    writer.flush().unwrap();

    let config = PipelineConfig::from_json(CONFIG).unwrap();
    let registry = ProcessRegistry::default();
    config.validate(&registry).unwrap();

    let runner = PipelineRunner::new(config.runner_config());
    let mut sink = EventWriter::create(&output).unwrap();
    let summary = runner
        .try_run(
            |_| config.build_chain(&registry),
            EventReader::open(&input).unwrap(),
            &mut sink,
        )
        .unwrap();
    sink.flush().unwrap();

    assert_eq!(summary.events_in, 24);
    assert_eq!(summary.dropped, 5);
    assert_eq!(summary.events_out, 19);

    let events: Vec<Event> = EventReader::open(&output)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    let ids: Vec<u64> = events.iter().map(|e| e.id).collect();
    let expected: Vec<u64> = (0..24).filter(|id| id % 5 != 0).collect();
    assert_eq!(ids, expected);

    for event in &events {
        let cloud = event.hit_cloud().unwrap();
        assert!(cloud.len() <= 5);
        assert!((cloud.total_energy() - 80.0).abs() < 1e-9);
        assert_eq!(event.analysis.get("summary_nHits"), Some(cloud.len() as f64));
        assert_eq!(event.analysis.get("hitsReduction_initialHits"), Some(40.0));
    }
}

#[test]
fn test_malformed_input_surfaces_line() {
    let mut input = NamedTempFile::new().unwrap();
    writeln!(input, "{{\"id\":0,\"hits\":[]}}").unwrap();
    writeln!(input, "{{\"id\":1,\"hits\":[}}").unwrap();
    input.flush().unwrap();

    let runner = PipelineRunner::new(PipelineConfig::default().runner_config());
    let mut written = 0;
    let result = runner.try_run(
        |_| Ok(hitflow_processes::ProcessChain::new()),
        EventReader::open(input.path()).unwrap(),
        &mut |_: Event| -> Result<()> {
            written += 1;
            Ok(())
        },
    );

    match result {
        Err(Error::Record { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected a record error, got {:?}", other.map(|s| s.events_in)),
    }
    assert!(written <= 1);
}

#[test]
fn test_config_file_round_trip() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    let config = PipelineConfig::load(file.path()).unwrap();
    assert_eq!(config.processes.len(), 2);
    assert_eq!(config.processes[1].instance_name(), "summary");

    let text = serde_json::to_string(&config).unwrap();
    assert_eq!(PipelineConfig::from_json(&text).unwrap(), config);
}
