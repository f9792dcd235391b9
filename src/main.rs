use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use livetext::{
    BoundaryEvent, ContentTree, Dictionary, Document, Engine, EngineConfig, HighlightResult,
    NodeSpec,
};

const USAGE: &str = "usage: livetext <page.json> [--dict dict.json] [--config config.json] [--locate TEXT]";

struct Args {
    page: String,
    dict: Option<String>,
    config: Option<String>,
    locate: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut page = None;
    let mut dict = None;
    let mut config = None;
    let mut locate = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--dict" => dict = Some(value("--dict")?),
            "--config" => config = Some(value("--config")?),
            "--locate" => locate = Some(value("--locate")?),
            "-h" | "--help" => bail!(USAGE),
            _ if page.is_none() => page = Some(arg),
            _ => bail!("unexpected argument {arg:?}\n{USAGE}"),
        }
    }

    let Some(page) = page else {
        bail!(USAGE);
    };
    Ok(Args {
        page,
        dict,
        config,
        locate,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if args.dict.is_some() {
        config.substitution_enabled = true;
    }

    let raw = std::fs::read_to_string(&args.page)
        .with_context(|| format!("failed to read page {}", args.page))?;
    let spec = NodeSpec::from_json(&raw).context("page must be a JSON node tree")?;
    let mut doc = Document::from_spec(&spec)?;

    let mut engine = Engine::new(config);
    if let Some(path) = &args.dict {
        let dictionary = Dictionary::load(path)?;
        engine.set_dictionary(&mut doc, dictionary);
    }
    engine.attach(&mut doc);

    println!("{}", engine.index().buffer());

    if let Some(text) = &args.locate {
        let event = BoundaryEvent::new(text.as_str(), 0);
        match engine.on_word_boundary(&mut doc, &event) {
            HighlightResult::Highlighted(range) => {
                let word = engine.index().slice(range.start, range.end);
                println!("highlight {}..{}: {word}", range.start, range.end);
                if let Some(wrapper) = engine.highlight_element() {
                    println!("wrapper holds {:?}", doc.text_content(wrapper));
                }
            }
            HighlightResult::Unchanged | HighlightResult::Nothing => {
                println!("not found: {text:?}");
            }
        }
    }

    for error in engine.diagnostics().iter() {
        eprintln!("warning: {error}");
    }
    Ok(())
}
