// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reading the target version a class file was compiled for.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use cq_crypto_config::ToolCommand;
use regex::Regex;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{CryptoError, Result};
use crate::process::run_tool;

const CLASS_MAGIC: u32 = 0xCAFE_BABE;

static MAJOR_VERSION: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?m)^\s+major\sversion:\s*(\d+)").unwrap());
static MINOR_VERSION: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?m)^\s+minor\sversion:\s*(\d+)").unwrap());

/// Class file `major.minor` -> release label.
const TARGET_LABELS: [(u16, u16, &str); 25] = [
	(45, 3, "1"),
	(46, 0, "2"),
	(47, 0, "3"),
	(48, 0, "4"),
	(49, 0, "5"),
	(50, 0, "6"),
	(51, 0, "7"),
	(52, 0, "8"),
	(53, 0, "9"),
	(54, 0, "10"),
	(55, 0, "11"),
	(56, 0, "12"),
	(57, 0, "13"),
	(58, 0, "14"),
	(59, 0, "15"),
	(60, 0, "16"),
	(61, 0, "17"),
	(62, 0, "18"),
	(63, 0, "19"),
	(64, 0, "20"),
	(65, 0, "21"),
	(66, 0, "22"),
	(67, 0, "23"),
	(68, 0, "24"),
	(69, 0, "25"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BytecodeVersion {
	pub major: u16,
	pub minor: u16,
}

impl BytecodeVersion {
	pub const fn new(major: u16, minor: u16) -> Self {
		Self { major, minor }
	}

	/// The release label this version maps to, e.g. `52.0` -> `"8"`.
	///
	/// `None` for anything outside the table; never a nearest match.
	pub fn target_label(&self) -> Option<&'static str> {
		TARGET_LABELS
			.iter()
			.find(|(major, minor, _)| *major == self.major && *minor == self.minor)
			.map(|(_, _, label)| *label)
	}
}

impl fmt::Display for BytecodeVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

/// Recovers the [`BytecodeVersion`] of a compiled class.
#[async_trait]
pub trait BytecodeInspector: Send + Sync {
	async fn inspect(&self, class_file: &Path) -> Result<BytecodeVersion>;
}

/// Reads the version straight from the class file header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassFileInspector;

#[async_trait]
impl BytecodeInspector for ClassFileInspector {
	async fn inspect(&self, class_file: &Path) -> Result<BytecodeVersion> {
		let mut header = [0u8; 8];
		let mut file = tokio::fs::File::open(class_file).await?;
		file.read_exact(&mut header).await.map_err(|e| {
			CryptoError::bytecode_parse(class_file, format!("short class file: {e}"))
		})?;

		let version = parse_class_header(&header)
			.ok_or_else(|| CryptoError::bytecode_parse(class_file, "not a class file"))?;

		debug!(
			path = %class_file.display(),
			%version,
			target = version.target_label().unwrap_or("unknown"),
			"read class file version"
		);
		Ok(version)
	}
}

/// Parse the magic, minor and major fields (all big-endian) of a class file.
pub fn parse_class_header(header: &[u8]) -> Option<BytecodeVersion> {
	let magic = u32::from_be_bytes(header.get(0..4)?.try_into().ok()?);
	if magic != CLASS_MAGIC {
		return None;
	}
	let minor = u16::from_be_bytes(header.get(4..6)?.try_into().ok()?);
	let major = u16::from_be_bytes(header.get(6..8)?.try_into().ok()?);
	Some(BytecodeVersion::new(major, minor))
}

/// Parses `javap -verbose` output.
#[derive(Debug, Clone)]
pub struct JavapInspector {
	tool: ToolCommand,
}

impl JavapInspector {
	pub fn new(tool: ToolCommand) -> Self {
		Self { tool }
	}
}

#[async_trait]
impl BytecodeInspector for JavapInspector {
	async fn inspect(&self, class_file: &Path) -> Result<BytecodeVersion> {
		let output = run_tool(
			&self.tool,
			[OsStr::new("-verbose"), class_file.as_os_str()],
			None,
		)
		.await?;
		debug!(path = %class_file.display(), output = %output.stdout, "javap output");

		let version = parse_javap_output(&output.stdout).ok_or_else(|| {
			CryptoError::bytecode_parse(class_file, "javap output lacks major/minor version")
		})?;

		debug!(
			path = %class_file.display(),
			%version,
			target = version.target_label().unwrap_or("unknown"),
			"disassembled class file version"
		);
		Ok(version)
	}
}

/// Extract the `major version:` and `minor version:` fields. Both must be
/// present.
pub fn parse_javap_output(output: &str) -> Option<BytecodeVersion> {
	let field = |re: &Regex| -> Option<u16> { re.captures(output)?.get(1)?.as_str().parse().ok() };
	Some(BytecodeVersion::new(
		field(&MAJOR_VERSION)?,
		field(&MINOR_VERSION)?,
	))
}
