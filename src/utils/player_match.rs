use crate::models::PlayerInfo;

/// Lowercase a player name and strip dots and surrounding whitespace
/// "P.J. Washington " -> "pj washington"
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find `query` in the roster: exact normalized match first, then substring either way
pub fn find_matching_player<'a>(roster: &'a [PlayerInfo], query: &str) -> Option<&'a PlayerInfo> {
    let wanted = normalize_name(query);
    if wanted.is_empty() {
        return None;
    }

    roster
        .iter()
        .find(|p| normalize_name(&p.name) == wanted)
        .or_else(|| {
            roster.iter().find(|p| {
                let candidate = normalize_name(&p.name);
                candidate.contains(&wanted) || wanted.contains(&candidate)
            })
        })
}
