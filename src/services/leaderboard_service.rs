//! Rankings, the live leaderboard message and season archival.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    dto::reply::CommandReply,
    error::ServiceError,
    gateway::{MemberFilter, MemberRef, MessagingGateway},
    services::context::{CommandContext, UNKNOWN_MEMBER},
    state::AppState,
};

const NO_POINTS: &str = "No one has any points.";
const NO_POINTS_FOR_MEMBER: &str = "You did not have any points in that season.";

/// One line of a ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    /// Competition rank: tied members share the best rank, the next rank skips.
    pub rank: usize,
    /// Member id.
    pub member_id: String,
    /// Season points.
    pub points: f64,
}

/// Sort members by points, highest first, and assign competition ranks.
pub fn rank_scores(scores: IndexMap<String, f64>) -> Vec<RankingRow> {
    let mut entries: Vec<(String, f64)> = scores.into_iter().collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut rows: Vec<RankingRow> = Vec::with_capacity(entries.len());
    for (index, (member_id, points)) in entries.into_iter().enumerate() {
        let rank = match rows.last() {
            Some(previous) if previous.points == points => previous.rank,
            _ => index + 1,
        };
        rows.push(RankingRow {
            rank,
            member_id,
            points,
        });
    }
    rows
}

/// Keep the first `limit` rows plus everyone tied with the last of them.
pub fn top_rows(rows: Vec<RankingRow>, limit: usize) -> Vec<RankingRow> {
    let Some(cutoff) = rows
        .get(limit.max(1).min(rows.len()).saturating_sub(1))
        .map(|row| row.rank)
    else {
        return rows;
    };
    rows.into_iter().filter(|row| row.rank <= cutoff).collect()
}

/// Render rows as a monospace block, right-justified like a spreadsheet dump.
fn format_table(header: Option<&[&str]>, rows: &[Vec<String>]) -> String {
    let columns = header
        .map(|header| header.len())
        .or_else(|| rows.first().map(Vec::len))
        .unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for line in header
        .map(|header| header.iter().map(|cell| cell.to_string()).collect::<Vec<_>>())
        .iter()
        .chain(rows.iter())
    {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    if let Some(header) = header {
        lines.push(justify(header.iter().copied(), &widths));
    }
    for row in rows {
        lines.push(justify(row.iter().map(String::as_str), &widths));
    }
    format!("```{}```", lines.join("\n"))
}

fn justify<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:>width$}"))
        .collect::<Vec<_>>()
        .join("  ")
}

fn format_points(points: f64) -> String {
    format!("{points:.2}")
}

/// Mean of the archived season scores after dropping the lowest fifth,
/// rounded to cents. No scores average to zero.
fn trimmed_mean<'a>(scores: impl IntoIterator<Item = &'a f64>) -> f64 {
    let mut scores: Vec<f64> = scores.into_iter().copied().collect();
    scores.sort_by(f64::total_cmp);
    let kept = &scores[scores.len() / 5..];
    if kept.is_empty() {
        return 0.0;
    }
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Display names of `member_ids`; members that left resolve to nothing.
///
/// A failed lookup is logged and leaves every name unresolved.
async fn resolve_names(
    gateway: &dyn MessagingGateway,
    member_ids: Vec<String>,
) -> HashMap<String, String> {
    if member_ids.is_empty() {
        return HashMap::new();
    }
    match gateway
        .fetch_members(MemberFilter::with_ids(member_ids))
        .await
    {
        Ok(members) => members
            .into_iter()
            .map(|member| (member.id, member.display_name))
            .collect(),
        Err(err) => {
            warn!(error = %err, "member lookup failed; names left unresolved");
            HashMap::new()
        }
    }
}

/// Render a ranking with member names, or the "no points" notice.
pub async fn rankings_text(gateway: &dyn MessagingGateway, rows: &[RankingRow]) -> String {
    if rows.is_empty() {
        return NO_POINTS.to_owned();
    }

    let names = resolve_names(
        gateway,
        rows.iter().map(|row| row.member_id.clone()).collect(),
    )
    .await;
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.rank.to_string(),
                names
                    .get(&row.member_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_MEMBER.to_owned()),
                format_points(row.points),
            ]
        })
        .collect();
    format_table(Some(&["Rank", "Name", "Points"]), &cells)
}

fn season_or_current(ctx: &CommandContext<'_>, season_id: Option<String>) -> String {
    season_id.unwrap_or_else(|| ctx.driver.season.current_season_id())
}

fn ranked_season(ctx: &CommandContext<'_>, season_id: &str) -> Vec<RankingRow> {
    rank_scores(ctx.driver.season.get_grades(season_id))
}

/// Public leaderboard of a season.
pub async fn get_rankings(
    ctx: &mut CommandContext<'_>,
    season_id: Option<String>,
) -> Result<CommandReply, ServiceError> {
    let season_id = season_or_current(ctx, season_id);
    let rows = top_rows(
        ranked_season(ctx, &season_id),
        ctx.state.config().leaderboard_rows,
    );
    Ok(CommandReply::text(rankings_text(ctx.gateway(), &rows).await))
}

/// Full ranking of a season.
pub async fn get_all_rankings(
    ctx: &mut CommandContext<'_>,
    season_id: Option<String>,
) -> Result<CommandReply, ServiceError> {
    let season_id = season_or_current(ctx, season_id);
    let rows = ranked_season(ctx, &season_id);
    Ok(CommandReply::text(rankings_text(ctx.gateway(), &rows).await))
}

/// The invoker's own row.
pub async fn get_my_rank(
    ctx: &mut CommandContext<'_>,
    season_id: Option<String>,
) -> Result<CommandReply, ServiceError> {
    let season_id = season_or_current(ctx, season_id);
    let mine: Vec<RankingRow> = ranked_season(ctx, &season_id)
        .into_iter()
        .filter(|row| row.member_id == ctx.invoker.id)
        .collect();
    if mine.is_empty() {
        return Ok(CommandReply::text(NO_POINTS_FOR_MEMBER));
    }
    Ok(CommandReply::text(rankings_text(ctx.gateway(), &mine).await))
}

/// Current season number.
pub fn current_season(ctx: &CommandContext<'_>) -> CommandReply {
    CommandReply::text(ctx.driver.season.current_season_id())
}

async fn year_members(ctx: &CommandContext<'_>) -> Result<Vec<MemberRef>, ServiceError> {
    let role = ctx
        .driver
        .constants
        .year_role
        .clone()
        .ok_or_else(|| ServiceError::MissingConfiguration("No year role configured.".into()))?;
    Ok(ctx
        .gateway()
        .fetch_members(MemberFilter::with_role(role))
        .await?)
}

/// Rank `members` by `points_of`, then sort the rows by name.
fn ranked_by_name(
    members: Vec<MemberRef>,
    mut points_of: impl FnMut(&MemberRef) -> f64,
) -> Vec<(String, RankingRow)> {
    let mut scores: IndexMap<String, f64> = IndexMap::new();
    let mut names: HashMap<String, String> = HashMap::new();
    for member in members {
        scores.insert(member.id.clone(), points_of(&member));
        names.insert(member.id, member.display_name);
    }

    let mut rows: Vec<(String, RankingRow)> = rank_scores(scores)
        .into_iter()
        .map(|row| {
            let name = names
                .get(&row.member_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_owned());
            (name, row)
        })
        .collect();
    rows.sort_by_key(|(name, _)| name.to_lowercase());
    rows
}

/// Participant roster of a season: every year-role member with a row,
/// zero-filled, sorted by name.
async fn roster(
    ctx: &CommandContext<'_>,
    season_id: &str,
) -> Result<Vec<(String, RankingRow)>, ServiceError> {
    let members = year_members(ctx).await?;
    let grades = ctx.driver.season.get_grades(season_id);
    Ok(ranked_by_name(members, |member| {
        grades.get(&member.id).copied().unwrap_or(0.0)
    }))
}

/// Alphabetical roster, optionally with rank and name columns.
pub async fn season_roster(
    ctx: &mut CommandContext<'_>,
    season_id: Option<String>,
    with_rank: bool,
) -> Result<CommandReply, ServiceError> {
    let season_id = season_or_current(ctx, season_id);
    let rows = roster(ctx, &season_id).await?;
    if rows.is_empty() {
        return Ok(CommandReply::text(NO_POINTS));
    }

    let cells: Vec<Vec<String>> = rows
        .into_iter()
        .map(|(name, row)| {
            if with_rank {
                vec![row.rank.to_string(), name, format_points(row.points)]
            } else {
                vec![format_points(row.points)]
            }
        })
        .collect();
    Ok(CommandReply::text(format_table(None, &cells)))
}

/// Push a season's roster totals to the export sink.
pub async fn archive_season(
    ctx: &mut CommandContext<'_>,
    season_id: Option<String>,
    sheet: Option<String>,
) -> Result<CommandReply, ServiceError> {
    let season_id =
        season_id.unwrap_or_else(|| (ctx.driver.season.current_season - 1).to_string());
    let sheet = sheet.unwrap_or_else(|| ctx.state.config().export_sheet.clone());

    let scores: Vec<(String, f64)> = roster(ctx, &season_id)
        .await?
        .into_iter()
        .map(|(name, row)| (name, row.points))
        .collect();
    ctx.state
        .export()
        .write_season_snapshot(&sheet, &season_id, scores)
        .await?;

    info!(season = %season_id, %sheet, "season archived");
    Ok(CommandReply::text(format!(
        "Added season {season_id} to sheet '{sheet}'."
    )))
}

/// All-time standings of the year-role members from an archive sheet.
///
/// Archived rows are matched by display name, or by member id for rows
/// written before the member had a name on record.
pub async fn overall_rankings(
    ctx: &mut CommandContext<'_>,
    sheet: Option<String>,
    sort_by_name: bool,
) -> Result<CommandReply, ServiceError> {
    let sheet = sheet.unwrap_or_else(|| ctx.state.config().export_sheet.clone());
    let archived = ctx.state.export().read_sheet(&sheet).await?;
    let members = year_members(ctx).await?;
    if members.is_empty() {
        return Ok(CommandReply::text(NO_POINTS));
    }

    let mut rows = ranked_by_name(members, |member| {
        archived
            .get(&member.display_name)
            .or_else(|| archived.get(&member.id))
            .map(|seasons| trimmed_mean(seasons.values()))
            .unwrap_or(0.0)
    });
    debug!(%sheet, archived = archived.len(), members = rows.len(), "overall rankings");

    let table = if sort_by_name {
        let cells: Vec<Vec<String>> = rows
            .into_iter()
            .map(|(_, row)| vec![format_points(row.points)])
            .collect();
        format_table(Some(&["Points"]), &cells)
    } else {
        rows.sort_by_key(|(_, row)| row.rank);
        let cells: Vec<Vec<String>> = rows
            .into_iter()
            .map(|(name, row)| vec![row.rank.to_string(), name, format_points(row.points)])
            .collect();
        format_table(Some(&["Rank", "Name", "Points"]), &cells)
    };
    Ok(CommandReply::text(table))
}

/// Recompute the current season's leaderboard and publish it.
///
/// The stored leaderboard message is edited in place; when there is none, or
/// the edit fails, a new message is posted and its id remembered.
pub async fn refresh_leaderboard(state: &AppState) -> Result<(), ServiceError> {
    let mut driver = state.driver().await;
    let Some(channel) = driver.constants.leaderboard_output_channel.clone() else {
        debug!("no leaderboard channel configured; skipping refresh");
        return Ok(());
    };

    let season_id = driver.season.current_season_id();
    let rows = top_rows(
        rank_scores(driver.season.get_grades(&season_id)),
        state.config().leaderboard_rows,
    );
    let text = rankings_text(state.gateway(), &rows).await;

    let edited = match driver.constants.leaderboard_output_message.as_deref() {
        Some(message) => match state.gateway().edit_message(&channel, message, &text).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, %channel, %message, "leaderboard edit failed; reposting");
                false
            }
        },
        None => false,
    };

    if !edited {
        let delivered = state.gateway().send_message(&channel, &text, None).await?;
        info!(%channel, message = %delivered.id, "posted leaderboard message");
        driver.constants.leaderboard_output_message = Some(delivered.id);
    }

    state.commit(&driver).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RecordingGateway;

    fn scores(entries: &[(&str, f64)]) -> IndexMap<String, f64> {
        entries
            .iter()
            .map(|(id, points)| (id.to_string(), *points))
            .collect()
    }

    fn ranks(rows: &[RankingRow]) -> Vec<(usize, &str)> {
        rows.iter()
            .map(|row| (row.rank, row.member_id.as_str()))
            .collect()
    }

    #[test]
    fn ties_share_the_lowest_rank() {
        let rows = rank_scores(scores(&[
            ("c", 10.0),
            ("a", 50.0),
            ("b", 50.0),
            ("d", 5.0),
        ]));
        assert_eq!(ranks(&rows), vec![(1, "a"), (1, "b"), (3, "c"), (4, "d")]);
    }

    #[test]
    fn top_rows_keep_ties_at_the_cutoff() {
        let rows = rank_scores(scores(&[
            ("a", 50.0),
            ("b", 40.0),
            ("c", 40.0),
            ("d", 30.0),
        ]));
        assert_eq!(
            ranks(&top_rows(rows.clone(), 2)),
            vec![(1, "a"), (2, "b"), (2, "c")]
        );
        assert_eq!(top_rows(rows.clone(), 20).len(), 4);
        assert_eq!(top_rows(rows, 1).len(), 1);
        assert!(top_rows(Vec::new(), 20).is_empty());
    }

    #[tokio::test]
    async fn rankings_resolve_names_and_flag_departed_members() {
        let gateway = RecordingGateway::new();
        gateway.add_member("a", "Ada", &[]);
        let rows = rank_scores(scores(&[("a", 110.0), ("gone", 60.0)]));

        let text = rankings_text(&gateway, &rows).await;
        assert!(text.starts_with("```"));
        assert!(text.contains("Ada"));
        assert!(text.contains("110.00"));
        assert!(text.contains(UNKNOWN_MEMBER));

        assert_eq!(rankings_text(&gateway, &[]).await, NO_POINTS);
    }

    #[tokio::test]
    async fn failed_member_lookup_renders_unknown_names() {
        let gateway = RecordingGateway::new();
        gateway.add_member("a", "Ada", &[]);
        gateway.fail_member_lookups();
        let rows = rank_scores(scores(&[("a", 110.0)]));

        let text = rankings_text(&gateway, &rows).await;
        assert!(text.contains(UNKNOWN_MEMBER));
        assert!(text.contains("110.00"));
        assert!(!text.contains("Ada"));
    }

    #[test]
    fn overall_points_drop_the_lowest_fifth() {
        assert_eq!(trimmed_mean(&[10.0, 20.0, 30.0, 40.0]), 25.0);
        assert_eq!(trimmed_mean(&[50.0, 0.0, 10.0, 20.0, 30.0]), 27.5);
        assert_eq!(trimmed_mean(&[1.0, 2.0, 2.0]), 1.67);
        assert_eq!(trimmed_mean(&[]), 0.0);
    }

    #[test]
    fn tables_are_right_justified() {
        let table = format_table(
            Some(&["Rank", "Name", "Points"]),
            &[vec!["1".into(), "Ada".into(), "110.00".into()]],
        );
        assert_eq!(table, "```Rank  Name  Points\n   1   Ada  110.00```");
    }
}
