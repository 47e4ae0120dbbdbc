//! Image source backed by an external still-capture program.
//!
//! The program is run once per request and must write a single encoded
//! image (any format the decoder recognizes) to stdout, e.g.
//! `fswebcam --no-banner -` or `libcamera-still -n -o -`.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{Capture, ImageSource, NamedImage, SourceError};
use crate::config::ConfigError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs a command per capture and decodes its stdout.
#[derive(Debug, Clone)]
pub struct CommandSource {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandSource {
    /// Creates a source from a program followed by its arguments.
    pub fn new(name: impl Into<String>, command: &[String]) -> Result<Self, ConfigError> {
        let (program, args) = command.split_first().ok_or(ConfigError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(Self {
            name: name.into(),
            program: program.clone(),
            args: args.to_vec(),
            timeout: None,
        })
    }

    /// Kills the program if a capture takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self) -> Result<Vec<u8>, SourceError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SourceError::CommandFailed(format!("{}: {}", self.program, e)))?;

        // Drain both pipes on helper threads so a chatty program cannot
        // block on a full pipe while we wait for it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            None => child.wait(),
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait().map_err(command_err)? {
                        break Ok(status);
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(SourceError::TimedOut(timeout));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        .map_err(command_err)?;

        let out = join(stdout);
        let err = join(stderr);
        if !status.success() {
            let message = String::from_utf8_lossy(&err);
            return Err(SourceError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                message.trim()
            )));
        }
        if out.is_empty() {
            return Err(SourceError::CaptureFailed(format!(
                "{} produced no image data",
                self.program
            )));
        }
        Ok(out)
    }
}

fn command_err(e: std::io::Error) -> SourceError {
    SourceError::CommandFailed(e.to_string())
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

impl ImageSource for CommandSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn images(&self) -> Result<Capture, SourceError> {
        let bytes = self.run()?;
        let image = image::load_from_memory(&bytes)?;
        tracing::debug!(
            source = %self.name,
            width = image.width(),
            height = image.height(),
            "Captured image"
        );
        Ok(Capture::now(vec![NamedImage::new(self.name.clone(), image)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandSource::new("cam", &[]),
            Err(ConfigError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command() {
        let source = CommandSource::new("cam", &["false".to_string()]).unwrap();
        assert!(matches!(source.images(), Err(SourceError::CommandFailed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_image_output() {
        let cmd = ["echo".to_string(), "hello".to_string()];
        let source = CommandSource::new("cam", &cmd).unwrap();
        assert!(matches!(source.images(), Err(SourceError::Decode(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_command() {
        let cmd = ["sleep".to_string(), "5".to_string()];
        let source = CommandSource::new("cam", &cmd)
            .unwrap()
            .with_timeout(Some(Duration::from_millis(100)));

        let started = Instant::now();
        assert!(matches!(source.images(), Err(SourceError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_decodes_png_from_stdout() {
        use crate::store::FrameFormat;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let img = image::DynamicImage::new_rgb8(5, 3);
        std::fs::write(&path, FrameFormat::Png.encode(&img, 75).unwrap()).unwrap();

        let cmd = ["cat".to_string(), path.display().to_string()];
        let capture = CommandSource::new("cam", &cmd).unwrap().images().unwrap();
        assert_eq!(capture.images[0].image.width(), 5);
    }
}
