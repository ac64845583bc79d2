use std::fs;
use std::path::Path;

use lifesim::sim::gpucompute::WORKGROUP_SIZE;

const SHADERS: [&str; 2] = ["src/sim/shader.wgsl", "src/rendering/render.wgsl"];

fn load(relative: &str) -> naga::Module {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(relative);
    let source = fs::read_to_string(&path).unwrap();
    match naga::front::wgsl::parse_str(&source) {
        Ok(module) => module,
        Err(e) => panic!("Failed to parse {relative}:\n{}", e.emit_to_string(&source)),
    }
}

#[test]
fn validate_all_shaders() {
    let mut errors = Vec::new();

    for relative in SHADERS {
        let module = load(relative);
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        if let Err(e) = validator.validate(&module) {
            errors.push(format!("Failed to validate {relative}:\n{e:?}"));
        }
    }

    if !errors.is_empty() {
        panic!("Shader validation failed:\n{}", errors.join("\n"));
    }
}

#[test]
fn entry_points_match_pipelines() {
    let compute = load(SHADERS[0]);
    let cs = compute
        .entry_points
        .iter()
        .find(|ep| ep.name == "cs_main")
        .expect("compute shader has cs_main");
    assert_eq!(cs.stage, naga::ShaderStage::Compute);
    assert_eq!(cs.workgroup_size, [WORKGROUP_SIZE, WORKGROUP_SIZE, 1]);

    let render = load(SHADERS[1]);
    let names: Vec<(&str, naga::ShaderStage)> = render
        .entry_points
        .iter()
        .map(|ep| (ep.name.as_str(), ep.stage))
        .collect();
    assert!(names.contains(&("vs_main", naga::ShaderStage::Vertex)));
    assert!(names.contains(&("fs_main", naga::ShaderStage::Fragment)));
}
