#![forbid(unsafe_code)]

//! Sigill CLI: sign and verify XML documents and SOAP messages.

use clap::{Args, Parser, Subcommand};
use sigill_core::Error;
use sigill_dsig::{AdapterConfig, SignatureTarget, XmlDsigAdapter};
use sigill_soap::SoapError;
use sigill_xml::XmlDocument;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sigill",
    about = "Sigill: XML-DSig enveloped signatures for XML documents and SOAP messages",
    version
)]
struct Cli {
    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an enveloped signature to an XML document
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Sign the element carrying this identifier instead of the document
        #[arg(long)]
        id: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Verify the first signature of an XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Verify every signature in the document
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Sign the body payload of a SOAP envelope
    SoapSign {
        /// Input SOAP envelope
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Verify the signed body payload of a SOAP envelope
    SoapVerify {
        /// Input SOAP envelope
        file: PathBuf,

        #[command(flatten)]
        keys: KeyArgs,
    },
}

/// Key material and algorithms. Flags override values from `--config`.
#[derive(Args, Default)]
struct KeyArgs {
    /// JSON adapter configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Private key (PEM or DER)
    #[arg(short = 'k', long)]
    key: Option<PathBuf>,

    /// Public key or certificate used for verification
    #[arg(long = "public-key")]
    public_key: Option<PathBuf>,

    /// Certificate with its private key (PEM) or PKCS#12 bundle
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Password for an encrypted certificate bundle
    #[arg(long)]
    password: Option<String>,

    /// Signature method URI used with --key or --cert
    #[arg(long = "signature-method")]
    signature_method: Option<String>,

    /// Digest method URI
    #[arg(long)]
    digest: Option<String>,

    /// Canonicalization method URI
    #[arg(long)]
    c14n: Option<String>,

    /// Reference transform URI, in order (repeatable)
    #[arg(long = "transform")]
    transforms: Vec<String>,
}

impl KeyArgs {
    fn into_config(self) -> Result<AdapterConfig, Error> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&read_file(path)?)
                .map_err(|e| Error::Io(std::io::Error::other(format!("{}: {e}", path.display()))))?,
            None => AdapterConfig::default(),
        };
        if self.key.is_some() {
            config.private_key = self.key;
        }
        if self.public_key.is_some() {
            config.public_key = self.public_key;
        }
        if self.cert.is_some() {
            config.certificate = self.cert;
        }
        if self.password.is_some() {
            config.password = self.password;
        }
        if let Some(uri) = self.signature_method {
            config.key_algorithm = uri;
        }
        if let Some(uri) = self.digest {
            config.digest_algorithm = uri;
        }
        if let Some(uri) = self.c14n {
            config.canonical_method = uri;
        }
        if !self.transforms.is_empty() {
            config.transforms = self.transforms;
        }
        Ok(config)
    }

    fn into_adapter(self) -> Result<XmlDsigAdapter, Error> {
        self.into_config()?.into_adapter()
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sign { file, id, output, keys } => cmd_sign(&file, id.as_deref(), output, keys),
        Commands::Verify { file, all, keys } => cmd_verify(&file, all, keys),
        Commands::SoapSign { file, output, keys } => cmd_soap_sign(&file, output, keys),
        Commands::SoapVerify { file, keys } => cmd_soap_verify(&file, keys),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_sign(
    file: &Path,
    id: Option<&str>,
    output: Option<PathBuf>,
    keys: KeyArgs,
) -> Result<bool, SoapError> {
    let adapter = keys.into_adapter()?;
    let signed = sign_document(&adapter, &read_file(file)?, id)?;
    tracing::info!(file = %file.display(), "signed document");
    write_output(output, signed.as_bytes())?;
    Ok(true)
}

fn cmd_verify(file: &Path, all: bool, keys: KeyArgs) -> Result<bool, SoapError> {
    let mut adapter = keys.into_adapter()?;
    let doc = XmlDocument::parse(read_file(file)?)?;
    let valid = if all { adapter.verify_all(&doc)? } else { adapter.verify(&doc)? };
    report(valid);
    Ok(valid)
}

fn cmd_soap_sign(file: &Path, output: Option<PathBuf>, keys: KeyArgs) -> Result<bool, SoapError> {
    let adapter = keys.into_adapter()?;
    let signed = sigill_soap::sign_envelope(&adapter, &read_file(file)?)?;
    tracing::info!(file = %file.display(), "signed SOAP envelope");
    write_output(output, signed.as_bytes())?;
    Ok(true)
}

fn cmd_soap_verify(file: &Path, keys: KeyArgs) -> Result<bool, SoapError> {
    let mut adapter = keys.into_adapter()?;
    let valid = sigill_soap::verify_envelope(&mut adapter, &read_file(file)?)?;
    report(valid);
    Ok(valid)
}

fn sign_document(adapter: &XmlDsigAdapter, xml: &str, id: Option<&str>) -> Result<String, Error> {
    let mut doc = XmlDocument::parse(xml)?;
    let target = match id {
        Some(id) => SignatureTarget::Element(
            doc.element_by_id(id)?
                .ok_or_else(|| Error::InvalidUri(format!("no element with identifier {id:?}")))?,
        ),
        None => SignatureTarget::Document,
    };
    adapter.sign(&mut doc, target, None)?;
    Ok(doc.into_string())
}

fn report(valid: bool) {
    if valid {
        println!("OK");
    } else {
        println!("INVALID");
    }
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data)
            .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", p.display())))),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data).map_err(Error::Io)
        }
    }
}
