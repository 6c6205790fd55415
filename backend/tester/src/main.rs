use std::{collections::BTreeMap, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in many voters at once and have each vote immediately.
    Swarm {
        #[arg(long, default_value_t = 100)]
        voters: usize,

        #[arg(long, default_value = "C")]
        option: String,
    },

    /// Poll the results endpoint and print the tally whenever it moves.
    Watch {
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[derive(Deserialize)]
struct LoginResponse {
    credential: String,
}

#[derive(Deserialize)]
struct ResultsResponse {
    votes: BTreeMap<String, u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::new();

    match args.command {
        Command::Swarm { voters, option } => swarm(&client, &args.server, voters, &option).await,
        Command::Watch { interval } => watch(&client, &args.server, interval).await,
    }
}

async fn swarm(client: &Client, server: &str, voters: usize, option: &str) -> Result<()> {
    let before = results(client, server).await?;
    println!("Before: {}", format_votes(&before));

    let pb = ProgressBar::new(voters as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let outcomes = join_all((0..voters).map(|i| {
        let pb = pb.clone();
        async move {
            let outcome = login_and_vote(client, server, &format!("voter-{i}"), option).await;
            pb.inc(1);
            outcome
        }
    }))
    .await;

    pb.finish_with_message("Done");

    let mut accepted = 0;
    let mut rejected: BTreeMap<StatusCode, usize> = BTreeMap::new();

    for outcome in outcomes {
        match outcome? {
            StatusCode::OK => accepted += 1,
            status => *rejected.entry(status).or_default() += 1,
        }
    }

    let after = results(client, server).await?;

    println!("\nAccepted: {accepted}");
    for (status, count) in &rejected {
        println!("Rejected ({status}): {count}");
    }
    println!("After: {}", format_votes(&after));

    let gained = after
        .values()
        .sum::<u64>()
        .saturating_sub(before.values().sum::<u64>());
    if gained < accepted as u64 {
        bail!("{accepted} votes accepted but the tally only grew by {gained}");
    }

    Ok(())
}

async fn watch(client: &Client, server: &str, interval: u64) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let mut last = None;

    loop {
        ticker.tick().await;

        match results(client, server).await {
            Ok(votes) if last.as_ref() != Some(&votes) => {
                println!("{}", format_votes(&votes));
                last = Some(votes);
            }
            Ok(_) => {}
            Err(e) => println!("Failed to fetch results: {e:#}"),
        }
    }
}

async fn login_and_vote(
    client: &Client,
    server: &str,
    name: &str,
    option: &str,
) -> Result<StatusCode> {
    let login: LoginResponse = client
        .post(format!("{server}/login"))
        .json(&json!({ "name": name }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("Malformed login response")?;

    let response = client
        .post(format!("{server}/vote"))
        .bearer_auth(&login.credential)
        .json(&json!({ "option": option }))
        .send()
        .await?;

    Ok(response.status())
}

async fn results(client: &Client, server: &str) -> Result<BTreeMap<String, u64>> {
    let response: ResultsResponse = client
        .get(format!("{server}/results"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("Malformed results response")?;

    Ok(response.votes)
}

fn format_votes(votes: &BTreeMap<String, u64>) -> String {
    votes
        .iter()
        .map(|(option, count)| format!("{option}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}
