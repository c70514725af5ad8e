//! Handler for the `score` command.

use chrono::Utc;

use crate::application::sentiment::SentimentAnalyzer;
use crate::cli::ScoreArgs;
use crate::domain::id::ProtocolId;
use crate::error::Result;

/// Score `args.text` and print the sample as JSON.
pub fn execute(args: &ScoreArgs) -> Result<()> {
    let analyzer = SentimentAnalyzer::default();
    let sample = analyzer.score(
        &args.text,
        args.protocol.as_deref().map(ProtocolId::from),
        args.engagement,
        Utc::now(),
    );
    println!("{}", serde_json::to_string_pretty(&sample)?);
    Ok(())
}
