mod common;

use common::{config, gray, wait_until, ScriptedSource};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use timelapse_cam::Timelapse;

#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[test]
fn failed_tick_is_logged() {
    let log = SharedLog::default();
    let writer = log.clone();
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .init();

    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(gray(1)),
        Err("lens cap on".to_string()),
        Ok(gray(3)),
    ]));
    let timelapse = Timelapse::new(config(&dir, 0.05, 10.0), source.clone()).unwrap();

    assert!(wait_until(Duration::from_secs(10), || source.calls() >= 3));
    timelapse.close();

    let output = log.contents();
    assert!(output.contains("Cannot read images"), "log was: {output}");
    assert!(output.contains("lens cap on"));
    assert_eq!(timelapse.store().len().unwrap(), 2);
}
