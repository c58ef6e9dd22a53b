use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::thread;
use std::time::Duration;

/// Spinner plus bar for one ffmpeg pass, fed by `-progress pipe:1` output.
pub struct PassProgress {
    _multi: MultiProgress,
    spinner: ProgressBar,
    bar: ProgressBar,
    total_ms: u64,
}

impl PassProgress {
    pub fn new(total_ms: u64, label: &str, hidden: bool) -> Self {
        let multi = MultiProgress::new();
        if hidden {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }

        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.enable_steady_tick(Duration::from_millis(80));
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style.tick_strings(&["-", "\\", "|", "/"]));
        }
        spinner.set_message(format!("{label}: starting."));

        let total_ms = total_ms.max(1);
        let bar = multi.add(ProgressBar::new(total_ms));
        if let Ok(style) = ProgressStyle::with_template(
            "[{elapsed_precise}]  [{bar:50.cyan/bright-black}] {percent:>3}%  ETA:{eta_precise}  {wide_msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(label.to_string());

        Self {
            _multi: multi,
            spinner,
            bar,
            total_ms,
        }
    }

    fn update(&self, pos_ms: u64) {
        self.bar.set_position(pos_ms);
        let pct = (pos_ms as f64) / (self.total_ms as f64);
        if pct < 0.95 {
            self.spinner.set_message("Encoding.");
        } else {
            self.spinner.set_message("Finalizing and muxing.");
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        self.spinner.finish_and_clear();
    }
}

/// Parses one `key=value` line of ffmpeg's progress stream.
pub fn parse_progress_line<'a>(re: &Regex, line: &'a str) -> Option<(&'a str, &'a str)> {
    let caps = re.captures(line.trim())?;
    let key = caps.get(1)?.as_str();
    let val = caps.get(2)?.as_str();
    Some((key, val))
}

pub fn progress_regex() -> Regex {
    Regex::new(r"^(\w+)=([\w\-\.:/]+)$").expect("static regex")
}

pub fn pump_progress<R: Read + Send + 'static>(
    reader: R,
    ui: PassProgress,
) -> thread::JoinHandle<Result<()>> {
    thread::spawn(move || {
        let re_kv = progress_regex();
        let reader = BufReader::new(reader);

        for line in reader.lines() {
            let line = line?;
            match parse_progress_line(&re_kv, &line) {
                // out_time_ms is in microseconds despite its name
                Some(("out_time_ms", val)) => {
                    let us: u64 = val.parse().unwrap_or(0);
                    ui.update((us / 1000).min(ui.total_ms));
                }
                Some(("progress", "end")) => ui.finish(),
                _ => {}
            }
        }
        ui.finish();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_progress_line() {
        let re = progress_regex();
        assert_eq!(
            parse_progress_line(&re, "out_time_ms=1500000"),
            Some(("out_time_ms", "1500000"))
        );
        assert_eq!(
            parse_progress_line(&re, "out_time=00:00:01.500000\n"),
            Some(("out_time", "00:00:01.500000"))
        );
        assert_eq!(parse_progress_line(&re, "progress=end"), Some(("progress", "end")));
        assert_eq!(parse_progress_line(&re, "garbage line"), None);
    }

    #[test]
    fn test_pump_consumes_stream() {
        let stream = "frame=10\nout_time_ms=500000\nprogress=continue\n\
                      out_time_ms=999999999\nprogress=end\n";
        let ui = PassProgress::new(1000, "pass 2/2", true);
        let handle = pump_progress(Cursor::new(stream.as_bytes().to_vec()), ui);
        assert!(handle.join().unwrap().is_ok());
    }
}
