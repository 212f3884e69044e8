/// Parsed inbound text. Matching is case-insensitive on the command word
/// while arguments keep the sender's original casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetNick(String),
    GetNick,
    Level,
    Help,
    Song,
    Photo,
    Meme,
    YoutubeSearch(String),
    Ai(String),
    /// Fallthrough: anything that is not a recognized command.
    Chat(String),
}

pub const HELP_TEXT: &str =
    "Commands: /nick, /getnick, /level, /song, /photo, /meme, /yt <q>, /ai <q>, /help";

/// Ordered command table. Prefix commands require their trailing space so
/// `/nickname` or a bare `/nick` cannot shadow-match; exact commands must
/// match the whole (trimmed) text. First match wins.
pub fn parse(raw: &str) -> Command {
    let text = raw.trim();

    if let Some(rest) = strip_prefix_ci(text, "/nick ") {
        return Command::SetNick(rest.trim().to_string());
    }

    match text.to_lowercase().as_str() {
        "/getnick" => return Command::GetNick,
        "/level" => return Command::Level,
        "/help" => return Command::Help,
        "/song" => return Command::Song,
        "/photo" => return Command::Photo,
        "/meme" => return Command::Meme,
        _ => {}
    }

    if let Some(rest) = strip_prefix_ci(text, "/yt ") {
        return Command::YoutubeSearch(rest.to_string());
    }
    if let Some(rest) = strip_prefix_ci(text, "/ai ") {
        return Command::Ai(rest.to_string());
    }

    Command::Chat(text.to_string())
}

/// ASCII case-insensitive prefix strip. Slicing by the prefix byte length is
/// safe because a matching head is ASCII.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
