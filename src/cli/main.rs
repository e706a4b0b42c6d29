use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use flight_delay_service::{
    data::TrainingDataLoader,
    ml::{Classifier, DelayModel, LogisticRegressionClassifier, MLConfig, TrainingDataset},
};
use reqwest::Client;
use serde_json::json;

#[derive(Parser)]
#[command(name = "flight-delay-cli")]
#[command(about = "Flight Delay Service CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "FLIGHT_DELAY_ENDPOINT")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Show model status
    Model,

    /// Request delay predictions
    Predict {
        /// Operator name, e.g. "Grupo LATAM"
        #[arg(short, long, required_unless_present = "file")]
        opera: Option<String>,

        /// Flight type: N (national) or I (international)
        #[arg(short = 't', long, default_value = "N")]
        flight_type: String,

        /// Month of the scheduled departure (1-12)
        #[arg(short, long, required_unless_present = "file")]
        month: Option<i64>,

        /// JSON file with a `{"flights": [...]}` body or a bare array of flights
        #[arg(short, long, conflicts_with_all = ["opera", "month"])]
        file: Option<String>,
    },

    /// Train locally on a CSV export and print hold-out metrics
    Evaluate {
        /// CSV dataset with OPERA, TIPOVUELO, MES, Fecha-I and Fecha-O columns
        #[arg(short, long)]
        data: String,

        /// Fraction of rows held out for evaluation
        #[arg(short = 's', long, default_value = "0.33")]
        test_size: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Model => {
            let response = client
                .get(format!("{}/model", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Predict {
            opera,
            flight_type,
            month,
            file,
        } => {
            let payload = match (file, opera, month) {
                (Some(path), _, _) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path))?;
                    let value: serde_json::Value = serde_json::from_str(&raw)
                        .with_context(|| format!("{} is not valid JSON", path))?;
                    if value.is_array() {
                        json!({ "flights": value })
                    } else {
                        value
                    }
                }
                (None, Some(opera), Some(month)) => json!({
                    "flights": [{
                        "OPERA": opera,
                        "TIPOVUELO": flight_type,
                        "MES": month,
                    }]
                }),
                _ => bail!("either --file or both --opera and --month are required"),
            };

            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);

            if !status.is_success() {
                bail!("prediction request failed with status {}", status);
            }
        }

        Commands::Evaluate { data, test_size } => {
            if !(0.0..1.0).contains(&test_size) {
                bail!("--test-size must be in [0, 1)");
            }

            let records = TrainingDataLoader::load_records(&data)
                .with_context(|| format!("failed to load {}", data))?;

            let config = MLConfig::default();
            let mut model = DelayModel::new(config.clone());
            let (features, labels) = model.preprocess(&records)?;
            let dataset = TrainingDataset::new(&features, &labels)?;
            let (train, test) = dataset.train_test_split(test_size);

            println!("Flight Delay Model Evaluation");
            println!("=============================");
            println!();
            println!("Samples: {} train, {} test", train.n_samples, test.n_samples);

            let mut classifier = LogisticRegressionClassifier::new(&config);
            let train_metrics = classifier.train(&train)?;
            println!(
                "Train accuracy: {:.2}%  F1: {:.3}",
                train_metrics.accuracy * 100.0,
                train_metrics.f1_score
            );

            if test.n_samples > 0 {
                let test_metrics = classifier.evaluate(&test)?;
                println!(
                    "Test accuracy:  {:.2}%  F1: {:.3}",
                    test_metrics.accuracy * 100.0,
                    test_metrics.f1_score
                );
                println!();
                println!("{}", serde_json::to_string_pretty(&test_metrics)?);
            }

            if let Some(summary) = model.training_summary() {
                println!();
                println!("{}", serde_json::to_string_pretty(summary)?);
            }
        }
    }

    Ok(())
}
