mod commands;

use clap::Parser;
use commands::{Cli, Commands, ModelArgs, SamplingArgs};
use inference::{BigramModel, EncodedToken, ModelMetadata};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sampler::Prediction;
use serde::Serialize;
use std::convert::Infallible;
use std::error::Error;
use std::path::Path;
use token_viz::animation::FRAME_SECONDS;
use token_viz::{RecordingSurface, Session, Viewport};
use tracing::info;

/// Used when neither `--corpus` nor `--text` is given
const DEFAULT_CORPUS: &[&str] = &[
    "The cat sat on the mat.",
    "The dog sat on the rug.",
    "The cat chased the dog.",
    "A dog chased a cat across the yard.",
    "The bird sang on the fence.",
    "The cat slept in the sun.",
];

#[derive(Serialize)]
struct StepReport<'a> {
    step: usize,
    prompt: &'a str,
    tokens: &'a [EncodedToken],
    metadata: &'a ModelMetadata,
    predictions: &'a [Prediction],
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sample {
            scores,
            file,
            draws,
            sampling,
            json,
        } => {
            let scores = match file {
                Some(path) => read_scores(&path)?,
                None => scores,
            };
            sample_scores(&scores, &sampling, draws, json)?;
        }
        Commands::Run {
            model,
            prompt,
            steps,
            sampling,
            json,
        } => {
            run_pipeline(&model, prompt, steps, &sampling, json)?;
        }
        Commands::Frames {
            model,
            prompt,
            ticks,
            every,
            travel,
            sampling,
        } => {
            step_frames(&model, &prompt, ticks, every, travel, &sampling)?;
        }
    }

    Ok(())
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn read_scores(path: &Path) -> Result<Vec<f32>, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    if let Ok(scores) = serde_json::from_str::<Vec<f32>>(&text) {
        return Ok(scores);
    }
    let scores = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(scores)
}

fn print_predictions(predictions: &[Prediction]) {
    println!(
        "{:>4} {:>6} {:<16} {:>9} {:>8} {:>8}",
        "rank", "id", "token", "score", "prob", "nucleus"
    );
    for (rank, p) in predictions.iter().enumerate() {
        let marker = if p.is_sampled { "*" } else { " " };
        let nucleus = if p.in_nucleus {
            format!("{:.4}", p.nucleus_probability)
        } else {
            "-".to_string()
        };
        println!(
            "{:>3}{} {:>6} {:<16} {:>9.3} {:>8.4} {:>8}",
            rank + 1,
            marker,
            p.id,
            format!("{:?}", p.text),
            p.raw_score,
            p.probability,
            nucleus
        );
    }
}

fn sample_scores(scores: &[f32], args: &SamplingArgs, draws: usize, json: bool) -> Result<(), Box<dyn Error>> {
    let config = args.resolve()?;
    let mut rng = make_rng(args.seed);
    let mut predictions = sampler::sample(scores, &config, |id| Ok::<_, Infallible>(format!("#{id}")), &mut rng)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
        return Ok(());
    }

    if predictions.is_empty() {
        println!("No candidates");
        return Ok(());
    }

    println!(
        "temperature {:.2}, top-k {}, top-p {:.2}",
        config.effective_temperature(),
        config.effective_top_k(),
        config.effective_top_p()
    );
    print_predictions(&predictions);

    if draws > 0 {
        let mut counts = vec![0usize; predictions.len()];
        for _ in 0..draws {
            if let Some(i) = sampler::resample(&mut predictions, &mut rng) {
                counts[i] += 1;
            }
        }
        println!("\n{draws} draws:");
        for (p, count) in predictions.iter().zip(&counts) {
            println!(
                "  {:<8} expected {:.4}  observed {:.4}",
                format!("#{}", p.id),
                p.nucleus_probability,
                *count as f64 / draws as f64
            );
        }
    }

    Ok(())
}

fn train_model(args: &ModelArgs) -> Result<BigramModel, Box<dyn Error>> {
    let file_text = match &args.corpus {
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };
    let mut texts: Vec<&str> = file_text.lines().filter(|l| !l.trim().is_empty()).collect();
    texts.extend(args.texts.iter().map(String::as_str));
    if texts.is_empty() {
        texts.extend_from_slice(DEFAULT_CORPUS);
    }

    let model = BigramModel::from_corpus(args.preset.config(), &texts)?;
    info!(lines = texts.len(), vocab = model.tokenizer().vocab_size(), "trained reference model");
    Ok(model)
}

fn new_session(model: &ModelArgs, sampling: &SamplingArgs) -> Result<Session, Box<dyn Error>> {
    let config = sampling.resolve()?;
    let seed = sampling.seed.unwrap_or_else(|| make_rng(None).next_u64());
    Ok(Session::new(Viewport::new(model.width, model.height), config, seed))
}

fn run_pipeline(
    args: &ModelArgs,
    mut prompt: String,
    steps: usize,
    sampling: &SamplingArgs,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut model = train_model(args)?;
    let mut session = new_session(args, sampling)?;

    for step in 1..=steps.max(1) {
        if session.run(&mut model, &prompt)?.is_none() {
            println!("Nothing to run for {prompt:?}");
            break;
        }
        let predictions = session.predictions();

        if json {
            let report = StepReport {
                step,
                prompt: &prompt,
                tokens: session.tokens(),
                metadata: session.metadata(),
                predictions,
            };
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("== step {step}: {prompt:?}");
            print_predictions(predictions);
            if let Some(scene) = session.scene() {
                let columns: Vec<String> = scene
                    .columns
                    .iter()
                    .map(|c| format!("{}({})", c.label, c.nodes.len()))
                    .collect();
                println!(
                    "scene: {} | nucleus {} of {} | zoom {:.2}",
                    columns.join(" "),
                    scene.nucleus_len(),
                    scene.bars.len(),
                    session.camera().scale()
                );
            }
        }

        match session.accept_sampled() {
            Some(next) => prompt = next,
            None => break,
        }
    }

    if !json {
        println!("final: {prompt:?}");
    }
    Ok(())
}

fn step_frames(
    args: &ModelArgs,
    prompt: &str,
    ticks: usize,
    every: usize,
    travel: bool,
    sampling: &SamplingArgs,
) -> Result<(), Box<dyn Error>> {
    let mut model = train_model(args)?;
    let mut session = new_session(args, sampling)?;
    if session.run(&mut model, prompt)?.is_none() {
        println!("Nothing to run for {prompt:?}");
        return Ok(());
    }

    let handle = travel.then(|| session.start_travel());
    let mut surface = RecordingSurface::new();
    let every = every.max(1);

    println!("{:>5} {:>8} {:>8} {:>6} {:>6}", "tick", "reveal", "particle", "cmds", "prims");
    for tick in 0..ticks {
        let outcome = session.tick(FRAME_SECONDS);
        surface.reset();
        session.render(&mut surface);

        if tick % every == 0 || outcome.reveal_finished || outcome.particle_finished {
            let state = session.animation();
            let particle = state
                .particle
                .as_ref()
                .map_or("-".to_string(), |p| format!("{:.3}", p.progress));
            println!(
                "{:>5} {:>8.3} {:>8} {:>6} {:>6}",
                tick,
                state.reveal_progress,
                particle,
                surface.len(),
                surface.primitive_count()
            );
        }
    }

    if let Some(mut handle) = handle {
        match handle.outcome() {
            Some(outcome) => println!("travel: {outcome:?}"),
            None => println!("travel: still running"),
        }
    }
    Ok(())
}
