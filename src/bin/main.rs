//! `ndn-validate`: validates one Data packet or signed Interest offline
//! against trust anchors stored as base64 certificate files.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, error, info, warn};

use ndn::encoding::types;
use ndn::packet::{Data, Interest};
use ndn::security::{Certificate, DefaultVerifier};
use ndn::time::SystemClock;
use ndn::trust::{
    lock_storage, CertificateFetcherOffline, PolicyChain, ValidationPolicyCommandInterest,
    ValidationPolicySimpleHierarchy, Validator, ValidatorOptions,
};

const ANCHOR_GROUP: &str = "ndn-validate";

#[derive(Debug)]
struct Settings {
    packet_path: PathBuf,
    trust_anchor_path: PathBuf,
    certificate_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

enum Packet {
    Data(Data),
    Interest(Interest),
}

fn load_config() -> Result<Settings, Box<dyn std::error::Error>> {
    let packet_path = env::args()
        .nth(1)
        .or_else(|| env::var("PACKET_PATH").ok())
        .ok_or("usage: ndn-validate <packet-file> (or set PACKET_PATH)")?;

    Ok(Settings {
        packet_path: PathBuf::from(packet_path),
        trust_anchor_path: PathBuf::from(
            env::var("TRUST_ANCHOR_PATH").unwrap_or_else(|_| "trust-anchors".to_string()),
        ),
        certificate_dir: env::var("CERTIFICATE_DIR").ok().map(PathBuf::from),
        config_path: env::var("CONFIG_PATH").ok().map(PathBuf::from),
    })
}

/// Reads a packet stored either as raw TLV or as base64 text.
fn load_packet(path: &Path) -> Result<Packet, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let wire = match bytes.first().map(|b| *b as u64) {
        Some(types::DATA) | Some(types::INTEREST) => bytes,
        _ => {
            let text: String = String::from_utf8(bytes)?.split_whitespace().collect();
            STANDARD.decode(text)?
        }
    };

    match wire.first().map(|b| *b as u64) {
        Some(types::DATA) => Ok(Packet::Data(Data::wire_decode(&wire)?)),
        Some(types::INTEREST) => Ok(Packet::Interest(Interest::wire_decode(&wire)?)),
        _ => Err(format!("{} is neither a Data packet nor an Interest", path.display()).into()),
    }
}

fn preload_certificates(validator: &Validator, dir: &Path) -> Result<usize, std::io::Error> {
    let mut loaded = 0;
    let mut storage = lock_storage(validator.storage());
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| Certificate::from_base64(&text).map_err(|e| e.to_string()))
        {
            Ok(certificate) => {
                debug!("Preloaded certificate {}", certificate.name());
                storage.cache_unverified_certificate(certificate);
                loaded += 1;
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(loaded)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let settings = load_config()?;
    let options = match &settings.config_path {
        Some(path) => ValidatorOptions::from_json_file(path)?,
        None => ValidatorOptions::from_env()?,
    };
    debug!("Validator options: {:?}", options);

    let packet = load_packet(&settings.packet_path)?;
    let policy = match packet {
        Packet::Data(_) => PolicyChain::new(ValidationPolicySimpleHierarchy),
        Packet::Interest(_) => {
            let mut chain = PolicyChain::new(ValidationPolicyCommandInterest::new(
                options.command_interest.clone(),
            ));
            chain.set_inner_policy(ValidationPolicySimpleHierarchy);
            chain
        }
    };

    let validator = Validator::with_options(
        policy,
        Arc::new(CertificateFetcherOffline::new()),
        &options,
        Arc::new(DefaultVerifier),
        Arc::new(SystemClock),
    );
    validator.load_anchor_from_path(
        ANCHOR_GROUP,
        &settings.trust_anchor_path,
        options.anchor_refresh_period(),
        settings.trust_anchor_path.is_dir(),
    )?;
    if let Some(dir) = &settings.certificate_dir {
        let loaded = preload_certificates(&validator, dir)?;
        info!("Preloaded {} certificates from {}", loaded, dir.display());
    }

    let result = match packet {
        Packet::Data(data) => validator.check_data(data).await.map(|d| d.name().clone()),
        Packet::Interest(interest) => validator
            .check_interest(interest)
            .await
            .map(|i| i.name().clone()),
    };

    match result {
        Ok(name) => {
            info!("Validated {}", name);
            println!("OK {}", name);
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            println!("FAIL {} ({})", e.code().code(), e);
            std::process::exit(1);
        }
    }
}
