//! Shell scripts standing in for ffmpeg and ffprobe in unit tests.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::video::FfmpegTools;

/// JSON ffprobe prints for one 25fps h264 stream
pub(crate) fn stream_info(width: u32, height: u32, frames: u64) -> String {
    format!(
        r#"{{"streams":[{{"codec_name":"h264","width":{},"height":{},"avg_frame_rate":"25/1","r_frame_rate":"25/1","nb_frames":"{}"}}],"format":{{"duration":"{}"}}}}"#,
        width,
        height,
        frames,
        frames as f64 / 25.0
    )
}

pub(crate) fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Tools for a `width`x`height` source living in `dir`
///
/// Decoding runs `decoder` as shell. Encoding (`-i -`) copies raw stdin to
/// the output path and records its arguments in `dir/encoder.args`.
pub(crate) fn scripted_tools(dir: &Path, width: u32, height: u32, frames: u64, decoder: &str) -> FfmpegTools {
    let inspect = dir.join("fake-stream-info");
    write_script(
        &inspect,
        &format!("cat <<'EOF'\n{}\nEOF", stream_info(width, height, frames)),
    );

    let codec = dir.join("fake-ffmpeg");
    write_script(
        &codec,
        &format!(
            "for last; do :; done\n\
             case \" $* \" in\n\
             *\" -i - \"*) echo \"$*\" > \"{}\"; cat > \"$last\"; exit 0 ;;\n\
             esac\n\
             {}",
            dir.join("encoder.args").display(),
            decoder
        ),
    );

    FfmpegTools {
        ffmpeg: codec.display().to_string(),
        ffprobe: inspect.display().to_string(),
    }
}

/// Decoder body emitting `frames` black frames
pub(crate) fn black_frames(width: u32, height: u32, frames: u64) -> String {
    format!("head -c {} /dev/zero", width as u64 * height as u64 * 3 * frames)
}
