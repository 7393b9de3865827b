use crate::config::CliConfig;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_core::storage::{RoundStore, Storage};
use raffle_core::Result;

pub async fn handle_history(limit: usize, cli_config: &CliConfig) -> Result<()> {
    let storage = Storage::new(&cli_config.db_path()).await?;
    let store = RoundStore::new(&storage);

    let total = store.round_count().await?;
    let rounds = store.list_rounds(limit).await?;
    if rounds.is_empty() {
        println!("No rounds recorded yet. Run 'raffle simulate' to play some.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Raffle", "Round", "Request", "Winner", "Payout (wei)", "Players", "Completed",
    ]);

    for round in &rounds {
        let raffle = round.raffle.to_string();
        table.add_row(vec![
            raffle[..10].to_string(), // truncated for display
            round.round.to_string(),
            round.request_id.to_string(),
            round.winner.to_string(),
            round.payout.to_wei().to_string(),
            round.players.to_string(),
            round.completed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{}", table);
    println!("Showing {} of {} recorded rounds", rounds.len(), total);
    Ok(())
}
