//! FFmpeg RTSP → HLS command builder.

use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Tunables for the HLS output of every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsSettings {
    /// FFmpeg log level (`-v`)
    pub log_level: String,
    /// RTSP transport protocol for `rtsp://` inputs
    pub rtsp_transport: String,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
    /// Segment duration in seconds (`-hls_time`)
    pub segment_secs: u32,
    /// Segments kept in the playlist (`-hls_list_size`)
    pub list_size: u32,
    /// Output frame rate
    pub frame_rate: u32,
}

impl Default for HlsSettings {
    fn default() -> Self {
        Self {
            log_level: "warning".to_string(),
            rtsp_transport: "tcp".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            segment_secs: 2,
            list_size: 5,
            frame_rate: 30,
        }
    }
}

/// Builder for one source's FFmpeg HLS command.
#[derive(Debug, Clone)]
pub struct HlsCommand {
    /// Input URL
    input: String,
    /// Output playlist path
    playlist: PathBuf,
    /// Segment filename pattern
    segment_pattern: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i, before the playlist)
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl HlsCommand {
    /// Create a bare command reading `input` and writing `playlist`.
    pub fn new(
        input: impl Into<String>,
        playlist: impl AsRef<Path>,
        segment_pattern: impl AsRef<Path>,
    ) -> Self {
        Self {
            input: input.into(),
            playlist: playlist.as_ref().to_path_buf(),
            segment_pattern: segment_pattern.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "warning".to_string(),
        }
    }

    /// Create the standard live-camera command from settings.
    pub fn from_settings(
        input: impl Into<String>,
        playlist: impl AsRef<Path>,
        segment_pattern: impl AsRef<Path>,
        settings: &HlsSettings,
    ) -> Self {
        let cmd = Self::new(input, playlist, segment_pattern).log_level(&settings.log_level);

        let cmd = if cmd.is_rtsp() {
            cmd.input_arg("-rtsp_transport")
                .input_arg(&settings.rtsp_transport)
        } else {
            cmd
        };

        cmd.video_codec("copy")
            .audio_codec(&settings.audio_codec)
            .audio_bitrate(&settings.audio_bitrate)
            .output_arg("-f")
            .output_arg("hls")
            .output_arg("-hls_time")
            .output_arg(settings.segment_secs.to_string())
            .output_arg("-hls_list_size")
            .output_arg(settings.list_size.to_string())
            .output_arg("-hls_flags")
            .output_arg("delete_segments+program_date_time")
            .output_arg("-fflags")
            .output_arg("+genpts+igndts")
            .output_arg("-vsync")
            .output_arg("cfr")
            .output_arg("-r")
            .output_arg(settings.frame_rate.to_string())
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    fn is_rtsp(&self) -> bool {
        let lower = self.input.to_ascii_lowercase();
        lower.starts_with("rtsp://") || lower.starts_with("rtsps://")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.iter().cloned());

        args.push("-hls_segment_filename".to_string());
        args.push(self.segment_pattern.to_string_lossy().to_string());

        // Overwrite a playlist left behind by a previous worker
        args.push("-y".to_string());
        args.push(self.playlist.to_string_lossy().to_string());

        args
    }
}

/// Resolve the FFmpeg binary (a bare name is looked up in PATH).
pub fn check_ffmpeg(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let program = program.as_ref();
    which::which(program)
        .map_err(|_| MediaError::FfmpegNotFound(program.to_string_lossy().to_string()))
}
