use std::time::{Duration, Instant};
use regex::Regex;

pub(crate) fn trace(profile: bool, l_type: &str, l_step: &str, detect: Instant, _detect_elapsed: Duration) -> Duration {
    if profile {
        log::info!("{} | Total={}ms | {}={:.2?}", l_type, detect.elapsed().as_millis(), l_step, detect.elapsed() - _detect_elapsed);
    }
    else {
        log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, detect.elapsed(), l_step, detect.elapsed() - _detect_elapsed);
    }
    detect.elapsed()
}

/// Parses class names out of a python-style dict literal as stored in ONNX metadata,
/// e.g. `{0: 'stop_sign', 1: "yield"}`.
pub(crate) fn parse_names(names: &str) -> Vec<String> {
    let re = match Regex::new(r#"(['"])([-()\w ']+?)(['"])"#) {
        Ok(re) => re,
        Err(_) => return vec![],
    };
    re.captures_iter(names)
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Placeholder names `# 0`, `# 1`, ... for models without class names.
pub(crate) fn n2s(n: usize) -> Vec<String> {
    (0..n).map(|x| format!("# {}", x)).collect::<Vec<String>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names_from_metadata() {
        let names = parse_names(r#"{0: 'stop_sign', 1: "yield", 2: 'no entry'}"#);
        assert_eq!(names, vec!["stop_sign", "yield", "no entry"]);
    }

    #[test]
    fn placeholder_names() {
        assert_eq!(n2s(2), vec!["# 0", "# 1"]);
    }
}
