/// Available commands and autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Space,
  Osdr,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: CommandKind,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "space",
    aliases: &["iss", "home", "summary"],
    description: "ISS position and space summary",
    kind: CommandKind::Space,
  },
  Command {
    name: "osdr",
    aliases: &["datasets", "ds"],
    description: "NASA open science datasets",
    kind: CommandKind::Osdr,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit orbitdash",
    kind: CommandKind::Quit,
  },
];

/// Look up a command by exact name or alias
pub fn find(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input_lower).map(|rank| (cmd, rank)))
    .collect();

  // Stable sort keeps declaration order within a rank
  matches.sort_by_key(|(_, rank)| *rank);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` when the command does not match at all
fn match_rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("osdr");
    assert_eq!(suggestions[0].kind, CommandKind::Osdr);
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("iss");
    assert_eq!(suggestions[0].kind, CommandKind::Space);
    assert_eq!(get_suggestions("q")[0].kind, CommandKind::Quit);
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("sp");
    assert_eq!(suggestions[0].name, "space");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("mmar");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "space");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
    assert!(find("zzz").is_none());
  }

  #[test]
  fn test_find_by_alias() {
    assert_eq!(find(" DataSets ").map(|c| c.kind), Some(CommandKind::Osdr));
    assert_eq!(find("exit").map(|c| c.kind), Some(CommandKind::Quit));
  }
}
