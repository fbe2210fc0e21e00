use crate::models::MatchRecord;

/// Line emitted in place of a record that lacks teams or date
pub const INVALID_MATCH_LINE: &str = "Partido inválido: faltan homeTeam, awayTeam o date.";

/// Placeholder for an odds value that was not supplied
pub const MISSING_ODDS: &str = "N/A";

const DEFAULT_HEADER: &str = "Actúa como un analista experto en apuestas deportivas.
Analiza los siguientes partidos y sugiere una apuesta razonada para cada uno considerando: rendimiento actual, cuotas, historia entre los equipos y valor esperado.";

const DEFAULT_FOOTER: &str = "Formato esperado:
- 1 análisis por partido (máximo 100 palabras cada uno).
- Sé directo, profesional y no des rodeos.";

/// Fixed wording placed around the match list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub header: String,
    pub footer: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            footer: DEFAULT_FOOTER.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Assemble the full instruction text around the formatted lines
    pub fn render(&self, lines: &[String]) -> String {
        format!(
            "{}\n\nPartidos:\n{}\n\n{}",
            self.header.trim(),
            lines.join("\n"),
            self.footer.trim()
        )
    }
}

/// Lines echoed back to the caller plus the prompt built from them
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedBatch {
    pub lines: Vec<String>,
    pub prompt: String,
}

/// Format every match, in input order, and build the prompt
pub fn format_matches(matches: &[MatchRecord], template: &PromptTemplate) -> FormattedBatch {
    let lines: Vec<String> = matches.iter().map(format_match).collect();
    let prompt = template.render(&lines);

    FormattedBatch { lines, prompt }
}

/// Render one match as `"{home} vs {away} (Fecha: {date}, Cuotas: {h}/{d}/{a})"`
///
/// Never fails: a record without teams or date becomes [`INVALID_MATCH_LINE`]
/// and absent odds become [`MISSING_ODDS`]. Records that passed strict
/// validation always take the normal path.
pub fn format_match(record: &MatchRecord) -> String {
    let (Some(home_team), Some(away_team), Some(date)) = (
        present(&record.home_team),
        present(&record.away_team),
        present(&record.date),
    ) else {
        return INVALID_MATCH_LINE.to_string();
    };

    let odds = record.odds.clone().unwrap_or_default();

    format!(
        "{} vs {} (Fecha: {}, Cuotas: {}/{}/{})",
        home_team,
        away_team,
        date,
        format_price(odds.home),
        format_price(odds.draw),
        format_price(odds.away)
    )
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Shortest decimal form of a price: `2.0` prints as `2`, `3.2` as `3.2`
fn format_price(price: Option<f64>) -> String {
    match price {
        Some(price) => price.to_string(),
        None => MISSING_ODDS.to_string(),
    }
}
