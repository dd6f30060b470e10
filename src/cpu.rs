//! Number of processors available to the process.
//!
//! Sources are tried in a fixed order and the first plausible answer wins.
//! Nothing here panics: when every source fails the count is 1.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

const SYS_CPU: &str = "/sys/devices/system/cpu";

/// Cached processor count.
pub fn cores() -> usize {
	static CORES: OnceLock<usize> = OnceLock::new();
	*CORES.get_or_init(count_cores)
}

/// Uncached detection.
pub fn count_cores() -> usize {
	let strategies: [(&str, fn() -> Option<usize>); 6] = [
		("env", from_env),
		("sys-present", from_sysdev),
		("sys-entries", count_cpu_entries),
		("cpuinfo", from_proc),
		("sysctl", from_sysctl),
		("std", from_std),
	];

	for (source, strategy) in strategies {
		if let Some(count) = strategy() {
			tracing::debug!(source, count, "Detected processor count");
			return count;
		}
	}

	tracing::warn!("Processor count unknown, assuming 1");
	1
}

fn positive(count: i64) -> Option<usize> {
	usize::try_from(count).ok().filter(|count| *count > 0)
}

fn parse_count(text: &str) -> Option<usize> {
	text.trim().parse::<i64>().ok().and_then(positive)
}

fn from_env() -> Option<usize> {
	std::env::var("NUMBER_OF_PROCESSORS")
		.ok()
		.as_deref()
		.and_then(parse_count)
}

fn from_sysdev() -> Option<usize> {
	let present = std::fs::read_to_string(Path::new(SYS_CPU).join("present")).ok()?;
	parse_present(&present)
}

/// `present` lists a range such as `0-7`; the last index plus one is the
/// count. A lone `0` means one processor.
fn parse_present(text: &str) -> Option<usize> {
	let last = text.trim().rsplit(['-', ',']).next()?;
	last.parse::<i64>().ok().and_then(|index| positive(index + 1))
}

fn count_cpu_entries() -> Option<usize> {
	let entries = std::fs::read_dir(SYS_CPU).ok()?;
	let count = entries
		.filter_map(Result::ok)
		.filter(|entry| is_cpu_entry(&entry.file_name().to_string_lossy()))
		.count();
	positive(count as i64)
}

fn is_cpu_entry(name: &str) -> bool {
	name.strip_prefix("cpu")
		.is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

fn from_proc() -> Option<usize> {
	let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
	parse_cpuinfo(&cpuinfo)
}

fn parse_cpuinfo(text: &str) -> Option<usize> {
	let count = text
		.lines()
		.filter(|line| {
			line.split(':')
				.next()
				.is_some_and(|key| key.trim() == "processor")
		})
		.count();
	positive(count as i64)
}

fn from_sysctl() -> Option<usize> {
	let output = Command::new("sysctl").args(["-n", "hw.ncpu"]).output().ok()?;
	if !output.status.success() {
		return None;
	}
	parse_count(&String::from_utf8_lossy(&output.stdout))
}

fn from_std() -> Option<usize> {
	std::thread::available_parallelism()
		.ok()
		.map(|count| count.get())
}
