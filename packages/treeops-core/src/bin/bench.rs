use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use treeops_core::{apply, diff, Element, Value};

const DEFAULT_COUNTS: &[u64] = &[100, 1_000];

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    implementation: &'static str,
    workload: String,
    timestamp: String,
    name: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    count: u64,
    diff_ms: f64,
    apply_ms: f64,
    round_trip: bool,
}

/// Frames of ten shapes each, `count` shapes in total.
fn board(count: u64) -> Vec<Element> {
    (0..count.div_ceil(10))
        .map(|frame| {
            let shapes = (0..10)
                .map(|i| frame * 10 + i)
                .filter(|n| *n < count)
                .map(|n| {
                    Element::new(format!("shape-{n}"), "rect")
                        .with_attribute("x", (n * 10) as f64)
                        .with_attribute("fill", "#3366ff")
                })
                .collect();
            Element::new(format!("frame-{frame}"), "frame").with_children(shapes)
        })
        .collect()
}

/// Reverses every frame, recolors every third shape, drops every seventh and adds one shape
/// per frame.
fn edited(board: &[Element]) -> Vec<Element> {
    board
        .iter()
        .map(|frame| {
            let mut shapes: Vec<Element> = frame
                .children
                .iter()
                .enumerate()
                .filter(|(i, _)| i % 7 != 6)
                .map(|(i, shape)| {
                    let mut shape = shape.clone();
                    if i % 3 == 0 {
                        shape.attributes.insert("fill".into(), Value::from("#ff6633"));
                    }
                    shape
                })
                .collect();
            shapes.reverse();
            shapes.insert(0, Element::new(format!("{}-note", frame.id), "text"));
            frame.clone().with_children(shapes)
        })
        .collect()
}

fn main() {
    let mut counts: Vec<u64> = DEFAULT_COUNTS.to_vec();
    let mut out_dir: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            counts = vec![val.parse().unwrap_or(500)];
        } else if let Some(val) = arg.strip_prefix("--counts=") {
            let parsed: Vec<u64> = val
                .split(',')
                .filter_map(|s| s.trim().parse::<u64>().ok())
                .collect();
            if !parsed.is_empty() {
                counts = parsed;
            }
        } else if let Some(val) = arg.strip_prefix("--out-dir=") {
            out_dir = Some(PathBuf::from(val));
        }
    }

    if let Some(dir) = &out_dir {
        fs::create_dir_all(dir).expect("mkdirs");
    }

    for count in counts {
        let old = board(count);
        let new = edited(&old);

        let start = Instant::now();
        let ops = diff(&old, &new);
        let diff_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let applied = apply(&old, &ops);
        let apply_ms = start.elapsed().as_secs_f64() * 1000.0;

        let duration_ms = diff_ms + apply_ms;
        let total_ops = ops.len() as u64;
        let workload = format!("diff-apply-{}", count);
        let out_path = out_dir
            .as_ref()
            .map(|dir| dir.join(format!("memory-{}.json", workload)));

        let output = Output {
            implementation: "treeops-core",
            workload: workload.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            name: workload,
            total_ops,
            duration_ms,
            ops_per_sec: if duration_ms > 0.0 {
                total_ops as f64 / duration_ms * 1000.0
            } else {
                f64::INFINITY
            },
            extra: Extra {
                count,
                diff_ms,
                apply_ms,
                round_trip: applied == new,
            },
            source_file: out_path.as_ref().map(|p| p.display().to_string()),
        };

        let json = serde_json::to_string_pretty(&output).expect("serialize");
        if let Some(path) = out_path {
            fs::write(&path, &json).expect("write output");
        }
        println!("{}", json);
    }
}
