use serde_json::Value;
use sketch_massing::config::sketch_to_scene::{self, ScriptedVerifierConfig};
use sketch_massing::image::io::{load_source_image, write_json_file, write_text_file};
use sketch_massing::verify::ScriptedVerifier;
use sketch_massing::{reconstruct_with_retry, Scene, SketchReconstructor};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage(program: &str) -> String {
    format!("Usage: {program} <config.json>")
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args
        .next()
        .unwrap_or_else(|| "sketch_to_scene".to_string());
    let config_path = args.next().ok_or_else(|| usage(&program))?;
    let config = sketch_to_scene::load_config(Path::new(&config_path)).map_err(|e| e.to_string())?;

    let image = load_source_image(&config.input).map_err(|e| e.to_string())?;
    let verifier = Arc::new(scripted_verifier(&config.verifier));
    let reconstructor = SketchReconstructor::new(config.params.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {e}"))?;
    let scene = runtime.block_on(reconstruct_with_retry(
        &reconstructor,
        &image,
        &config.request,
        verifier,
    ));

    print_summary(&scene);

    let out = &config.output;
    write_json_file(&out.scene_json, &scene.descriptor()).map_err(|e| e.to_string())?;
    println!("Scene descriptor written to {}", out.scene_json.display());
    if let Some(path) = &out.script {
        write_text_file(path, &scene.render_script(&config.params.output))
            .map_err(|e| e.to_string())?;
        println!("Script written to {}", path.display());
    }
    if let Some(path) = &out.report_json {
        write_json_file(path, &scene).map_err(|e| e.to_string())?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

/// String values are the oracle's raw reply text; objects are serialized.
fn response_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scripted_verifier(cfg: &ScriptedVerifierConfig) -> ScriptedVerifier {
    let mut verifier = ScriptedVerifier::new();
    for (id, answer) in &cfg.responses {
        verifier = match answer {
            Some(Value::Null) | None => verifier.with_failure(id.clone()),
            Some(value) => verifier.with_response(id.clone(), response_text(value)),
        };
    }
    if let Some(value) = cfg.default.as_ref().filter(|v| !v.is_null()) {
        verifier = verifier.with_default(response_text(value));
    }
    if let Some(ms) = cfg.delay_ms {
        verifier = verifier.with_delay(Duration::from_millis(ms));
    }
    verifier
}

fn print_summary(scene: &Scene) {
    println!("Reconstruction summary");
    println!("  group: {:?}", scene.group.kind);
    println!("  buildings: {}", scene.group.buildings.len());
    for b in &scene.group.buildings {
        println!(
            "    {} {:.1} x {:.1} m, height {:.1} m, {} floors",
            b.id, b.width_m, b.depth_m, b.height_m, b.floors
        );
    }
    println!("  connectors: {}", scene.group.connectors.len());
    println!(
        "  perspective: {} (fallback: {})",
        scene.frame.perspective_type.as_str(),
        scene.flags.perspective_fallback
    );
    println!(
        "  confidence: {:.3}{}",
        scene.confidence,
        if scene.low_confidence { " (low)" } else { "" }
    );
    for w in &scene.flags.warnings {
        println!("  warning: {w}");
    }
    if let Some(trace) = &scene.trace {
        println!("  total_ms: {:.3}", trace.timings.total_ms);
    }
}
