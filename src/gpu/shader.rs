//! WGSL program assembly and validation.
//!
//! A performer writes only `fn main_sound(time: f32) -> vec2<f32>` plus any
//! helpers it needs. Before compilation the source is wrapped as
//!
//! ```text
//! PREAMBLE           fixed, PREAMBLE_LINES lines: globals, output, sample_frame()
//! <performer source>
//! postamble          generated: sample textures, metadata, parameters, entry point
//! ```
//!
//! WGSL resolves module-scope declarations regardless of order, so everything
//! that depends on the program's interface goes after the performer's text and
//! the preamble length never changes.

use std::fmt::Write as _;

use crate::engine::program::{identifiers, ProgramInterface, MAX_PROGRAM_PARAMS, MAX_PROGRAM_SAMPLES};
use crate::error::{CompileError, Diagnostic};

/// Compute entry point of every assembled program.
pub const ENTRY_POINT: &str = "synth_main";

/// Function the performer must define.
pub const SOUND_FUNCTION: &str = "main_sound";

pub const WORKGROUP_SIZE: u32 = 64;

/// Frames per row of an encoded sample texture.
pub const SAMPLE_RASTER_WIDTH: u32 = 2048;

pub const PREAMBLE: &str = r#"const PI: f32 = 3.141592653589793;
const TAU: f32 = 6.283185307179586;

struct SynthGlobals {
    bpm: f32,
    sample_period: f32,
    block_period: f32,
    time: f32,
    beat_seconds: f32,
    bar_seconds: f32,
    sixteen_bar_seconds: f32,
    frame_count: u32,
    beat: f32,
    bar: f32,
    sixteen_bar: f32,
    param_count: u32,
    beat_time: f32,
    bar_time: f32,
    sixteen_bar_time: f32,
    // time + time_lo is the pass start time to f64 precision
    time_lo: f32,
    params: array<vec4<f32>, 4>,
}

@group(0) @binding(0) var<uniform> synth: SynthGlobals;
@group(0) @binding(1) var<storage, read_write> synth_out: array<vec4<f32>>;
@group(0) @binding(2) var<uniform> synth_samples: array<vec4<f32>, 16>;

// Seconds from the first frame of the pass to the frame being rendered.
var<private> synth_offset: f32;

// info = (width, height, sample rate, duration); silent outside the sample.
fn sample_frame(tex: texture_2d<f32>, info: vec4<f32>, time: f32) -> vec2<f32> {
    let frames = info.z * info.w;
    let position = time * info.z;
    if (position < 0.0 || position >= frames || info.x < 1.0) {
        return vec2<f32>(0.0, 0.0);
    }
    let index = u32(position);
    let width = u32(info.x);
    return textureLoad(tex, vec2<u32>(index % width, index / width), 0).xy;
}
"#;

const fn count_lines(text: &str) -> u32 {
    let bytes = text.as_bytes();
    let mut lines = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            lines += 1;
        }
        i += 1;
    }
    lines
}

/// Lines in front of the performer's first line.
pub const PREAMBLE_LINES: u32 = count_lines(PREAMBLE);

/// Declarations and entry point that bind `interface` to the globals.
pub fn postamble(interface: &ProgramInterface) -> String {
    let mut out = String::new();
    let _ = writeln!(out);

    for (slot, name) in interface.samples.iter().enumerate() {
        let _ = writeln!(
            out,
            "@group(1) @binding({}) var sample_{}: texture_2d<f32>;",
            slot, name
        );
        let _ = writeln!(out, "var<private> sample_{}_meta: vec4<f32>;", name);
    }
    for name in &interface.params {
        let _ = writeln!(out, "var<private> param_{}: f32;", name);
    }

    let _ = writeln!(out, "\nfn synth_bind() {{");
    for (slot, name) in interface.samples.iter().enumerate() {
        let _ = writeln!(out, "    sample_{}_meta = synth_samples[{}];", name, slot);
    }
    for (slot, name) in interface.params.iter().enumerate() {
        let _ = writeln!(
            out,
            "    param_{} = synth.params[{}][{}];",
            name,
            slot / 4,
            slot % 4
        );
    }
    let _ = writeln!(out, "}}");

    let _ = write!(
        out,
        r#"
@compute @workgroup_size({workgroup})
fn {entry}(@builtin(global_invocation_id) id: vec3<u32>) {{
    let texel = id.x;
    if (texel * 2u >= synth.frame_count) {{
        return;
    }}
    synth_bind();
    synth_offset = f32(texel * 2u) * synth.sample_period;
    let first = {sound}(synth.time + (synth.time_lo + synth_offset));
    synth_offset += synth.sample_period;
    let second = {sound}(synth.time + (synth.time_lo + synth_offset));
    synth_out[texel] = vec4<f32>(first, second);
}}
"#,
        workgroup = WORKGROUP_SIZE,
        entry = ENTRY_POINT,
        sound = SOUND_FUNCTION,
    );
    out
}

/// Full shader text for `source`.
pub fn assemble(source: &str, interface: &ProgramInterface) -> String {
    let mut text = String::with_capacity(PREAMBLE.len() + source.len() + 1024);
    text.push_str(PREAMBLE);
    text.push_str(source);
    if !source.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&postamble(interface));
    text
}

/// Parse and validate assembled WGSL.
///
/// Diagnostic lines refer to the assembled text; callers translate them back to
/// the performer's source with [`CompileError::translate`].
pub fn validate(assembled: &str) -> Result<naga::Module, CompileError> {
    let defines_sound = identifiers(assembled)
        .scan("", |previous, token| {
            let found = *previous == "fn" && token == SOUND_FUNCTION;
            *previous = token;
            Some(found)
        })
        .any(|found| found);
    if !defines_sound {
        return Err(CompileError::message(format!(
            "program must define `fn {}(time: f32) -> vec2<f32>`",
            SOUND_FUNCTION
        )));
    }

    let module = naga::front::wgsl::parse_str(assembled).map_err(|e| {
        let location = e.location(assembled);
        CompileError::new(vec![Diagnostic::new(
            location.map(|l| l.line_number),
            location.map(|l| l.line_position),
            e.message(),
        )])
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator.validate(&module).map_err(|e| {
        let location = e.location(assembled);
        let mut message = e.as_inner().to_string();
        let mut source = std::error::Error::source(e.as_inner());
        while let Some(cause) = source {
            let _ = write!(message, ": {}", cause);
            source = cause.source();
        }
        CompileError::new(vec![Diagnostic::new(
            location.map(|l| l.line_number),
            location.map(|l| l.line_position),
            message,
        )])
    })?;
    Ok(module)
}

/// Reject interfaces the fixed uniform layout cannot hold.
pub fn check_interface(interface: &ProgramInterface) -> Result<(), CompileError> {
    if interface.samples.len() > MAX_PROGRAM_SAMPLES || interface.params.len() > MAX_PROGRAM_PARAMS {
        return Err(CompileError::message(format!(
            "at most {} samples and {} parameters can be bound",
            MAX_PROGRAM_SAMPLES, MAX_PROGRAM_PARAMS
        )));
    }
    Ok(())
}
