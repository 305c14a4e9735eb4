// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures: a temporary cache root, shell stand-ins for the Java
//! tools and a mock AEM instance.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cq_common_http::{AemInstance, ReqwestAemClient};
use cq_crypto::{ClassFileInspector, CryptoConfig, CryptoFacility, MockExtractor};
use cq_crypto_config::{ConfigLayer, ToolCommand};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{basic_auth, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STANDALONE: &str = "cq-quickstart-6.1.0-standalone.jar";
pub const BUNDLE: &str = "com.adobe.granite.crypto-3.0.18-CQ610-B0004.jar";
pub const EMBEDDED: [&str; 4] = [
	"cryptojce-6.0.0.jar",
	"cryptojcommon-6.0.0.jar",
	"jcmFIPS-6.0.0.jar",
	"jSafeCryptoSupport.jar",
];
pub const MASTER_KEY: &[u8] = &[0x4d, 0x4b, 0x00, 0x01, 0xfe, 0xff];
pub const LOG_LIB: &[u8] = b"PK\x03\x04slf4j-api-1.7.12";
pub const LOG_LIB_PATH: &str = "/org/slf4j/slf4j-api/1.7.12/slf4j-api-1.7.12.jar";

/// Stand-in for `java -cp <cp> Decrypt <key> <value>`, run from the crypto
/// root. Follows the helper's exit code contract. Gives the entropy source a
/// moment to record its pid so tests can observe it.
const FAKE_JAVA: &str = r#"
for _ in 1 2 3 4 5 6 7 8 9 10; do [ -f ../../rngd.pid ] && break; sleep 0.05; done
[ "$#" -eq 5 ] || { echo "usage: Decrypt <key> <value>" >&2; exit 1; }
[ -f "tmp/$4" ] || { echo "master key tmp/$4 not found" >&2; exit 5; }
case "$5" in
	deadbeef) echo "javax.crypto.BadPaddingException" >&2; exit 3 ;;
	unreadable) echo "java.io.IOException: tmp/$4" >&2; exit 2 ;;
	cipher) exit 4 ;;
	crash) exit 42 ;;
	"{c0ffee}") echo " s3cr3t " ;;
	*) printf '\n  %s-plain\n' "$5" ;;
esac
"#;

/// Stand-in for `javac`: emits a Java 8 class header and logs each run.
const FAKE_JAVAC: &str = r#"
[ "$1" = -cp ] || exit 2
[ -f "$3" ] || { echo "error: file not found: $3" >&2; exit 2; }
echo "$2" >> javac.log
printf '\312\376\272\276\000\000\000\064' > "$(basename "$3" .java).class"
"#;

/// Stand-in for `rngd`: records its pid, then idles until signalled.
const FAKE_ENTROPY: &str = r#"
echo $$ > "$1"
exec sleep 30
"#;

pub struct Harness {
	pub dir: TempDir,
	pub server: MockServer,
	pub config: CryptoConfig,
	pub extractor: MockExtractor,
}

impl Harness {
	pub async fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let server = MockServer::start().await;
		let bin = dir.path().join("bin");
		std::fs::create_dir_all(&bin).unwrap();

		let script = |name: &str, body: &str| -> PathBuf {
			let path = bin.join(name);
			std::fs::write(&path, body).unwrap();
			path
		};
		let java = script("java.sh", FAKE_JAVA);
		let javac = script("javac.sh", FAKE_JAVAC);
		let entropy = script("rngd.sh", FAKE_ENTROPY);
		let helper = script("Decrypt.java", "public class Decrypt {}\n");

		let mut config = CryptoConfig::from_layer(ConfigLayer {
			cache_root: Some(dir.path().join("cache")),
			artifact_url: Some("https://repo.example.com/aem/cq-quickstart-6.1.0.jar".into()),
			..Default::default()
		})
		.unwrap();
		config.tools.java = sh(&java, &[]);
		config.tools.javac = sh(&javac, &[]);
		config.tools.entropy = sh(&entropy, &[&dir.path().join("rngd.pid")]);
		config.helper.source = Some(helper);
		config.log_libs.server = format!("{}/maven2", server.uri());
		config
			.log_libs
			.data
			.insert(LOG_LIB_PATH.to_string(), hex::encode(Sha256::digest(LOG_LIB)));
		config.instance = Some(AemInstance::new(server.uri(), "admin", "admin"));

		let extractor = MockExtractor::new()
			.with_entries(config.libraries.standalone_filter.clone(), [STANDALONE])
			.with_entries(config.libraries.bundle_filter.clone(), [BUNDLE])
			.with_entries(config.libraries.embedded_filter.clone(), EMBEDDED);

		Mock::given(method("GET"))
			.and(path(format!("/maven2{LOG_LIB_PATH}")))
			.respond_with(ResponseTemplate::new(200).set_body_bytes(LOG_LIB.to_vec()))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/etc/key/master"))
			.and(basic_auth("admin", "admin"))
			.respond_with(ResponseTemplate::new(200).set_body_bytes(MASTER_KEY.to_vec()))
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/system/console/crypto/.json"))
			.and(basic_auth("admin", "admin"))
			.and(body_string("datum=s3cr3t"))
			.respond_with(ResponseTemplate::new(200).set_body_string(r#"{"protected":"{c0ffee}"}"#))
			.mount(&server)
			.await;

		Self {
			dir,
			server,
			config,
			extractor,
		}
	}

	pub fn facility(&self) -> CryptoFacility {
		CryptoFacility::with_collaborators(
			self.config.clone(),
			Arc::new(self.extractor.clone()),
			Arc::new(ClassFileInspector),
			Arc::new(ReqwestAemClient::new().unwrap()),
		)
		.unwrap()
	}

	pub fn instance(&self) -> AemInstance {
		self.config.instance.clone().unwrap()
	}

	pub fn entropy_pid(&self) -> Option<u32> {
		std::fs::read_to_string(self.dir.path().join("rngd.pid"))
			.ok()
			.and_then(|s| s.trim().parse().ok())
	}

	pub fn compilations(&self) -> usize {
		std::fs::read_to_string(self.config.cache_root.join("crypto/javac.log"))
			.map(|s| s.lines().count())
			.unwrap_or(0)
	}
}

/// Run `script` through `/bin/sh` with `args`.
pub fn sh(script: &Path, args: &[&Path]) -> ToolCommand {
	ToolCommand::new("/bin/sh").with_args(
		std::iter::once(script)
			.chain(args.iter().copied())
			.map(|p| p.display().to_string()),
	)
}

pub fn process_alive(pid: u32) -> bool {
	Path::new(&format!("/proc/{pid}")).exists()
}
