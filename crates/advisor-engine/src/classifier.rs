//! Intent classification
//!
//! Pure, synchronous mapping from raw query text to a routing decision.
//! Command shortcuts are checked first; free text falls through an ordered
//! pattern list where more specific intents shadow broader ones. Ticker
//! references resolve through a symbol directory with a deterministic
//! tie-break; genuinely ambiguous references fail loudly rather than guess.

use advisor_core::{AdvisorError, AgentRole, Classification, ClassificationError, Path, Result};
use regex::Regex;

/// One listing known to the classifier. `primary` marks the main listing of
/// a company, as opposed to secondary instruments such as DVR shares.
struct SymbolEntry {
    symbol: &'static str,
    name: &'static str,
    primary: bool,
}

/// Built-in NSE listing table.
const LISTINGS: &[SymbolEntry] = &[
    SymbolEntry { symbol: "ASIANPAINT", name: "ASIAN PAINTS", primary: true },
    SymbolEntry { symbol: "AXISBANK", name: "AXIS BANK", primary: true },
    SymbolEntry { symbol: "BAJAJFINSV", name: "BAJAJ FINSERV", primary: true },
    SymbolEntry { symbol: "BAJFINANCE", name: "BAJAJ FINANCE", primary: true },
    SymbolEntry { symbol: "BHARTIARTL", name: "BHARTI AIRTEL", primary: true },
    SymbolEntry { symbol: "HCLTECH", name: "HCL TECHNOLOGIES", primary: true },
    SymbolEntry { symbol: "HDFCAMC", name: "HDFC ASSET MANAGEMENT", primary: false },
    SymbolEntry { symbol: "HDFCBANK", name: "HDFC BANK", primary: true },
    SymbolEntry { symbol: "HDFCLIFE", name: "HDFC LIFE INSURANCE", primary: false },
    SymbolEntry { symbol: "ICICIBANK", name: "ICICI BANK", primary: true },
    SymbolEntry { symbol: "ICICIPRULI", name: "ICICI PRUDENTIAL LIFE", primary: false },
    SymbolEntry { symbol: "INFY", name: "INFOSYS", primary: true },
    SymbolEntry { symbol: "ITC", name: "ITC", primary: true },
    SymbolEntry { symbol: "KOTAKBANK", name: "KOTAK MAHINDRA BANK", primary: true },
    SymbolEntry { symbol: "LT", name: "LARSEN & TOUBRO", primary: true },
    SymbolEntry { symbol: "MARUTI", name: "MARUTI SUZUKI", primary: true },
    SymbolEntry { symbol: "RELIANCE", name: "RELIANCE INDUSTRIES", primary: true },
    SymbolEntry { symbol: "SBIN", name: "STATE BANK OF INDIA", primary: true },
    SymbolEntry { symbol: "SUNPHARMA", name: "SUN PHARMACEUTICAL", primary: true },
    SymbolEntry { symbol: "TATAMOTORS", name: "TATA MOTORS", primary: true },
    SymbolEntry { symbol: "TATAMTRDVR", name: "TATA MOTORS DVR", primary: false },
    SymbolEntry { symbol: "TATASTEEL", name: "TATA STEEL", primary: true },
    SymbolEntry { symbol: "TCS", name: "TATA CONSULTANCY SERVICES", primary: true },
    SymbolEntry { symbol: "TITAN", name: "TITAN", primary: true },
    SymbolEntry { symbol: "WIPRO", name: "WIPRO", primary: true },
    SymbolEntry { symbol: "ZOMATO", name: "ZOMATO", primary: true },
];

/// Name words too generic to identify a company on their own.
const GENERIC_NAME_WORDS: &[&str] = &[
    "ASSET", "BANK", "FINANCE", "INDIA", "INDUSTRIES", "INSURANCE", "LIFE", "LIMITED", "LTD",
    "MANAGEMENT", "OF", "SERVICES",
];

/// Uppercase tokens that look like symbols but never are.
const SYMBOL_STOPWORDS: &[&str] = &[
    "AND", "BUY", "DD", "EPS", "FOR", "HOLD", "LTP", "MACD", "NEWS", "OR", "PB", "PE", "ROE",
    "RSI", "SELL", "THE", "VS",
];

/// Lookup from free-text company references to listing symbols.
pub struct SymbolDirectory {
    entries: &'static [SymbolEntry],
}

impl Default for SymbolDirectory {
    fn default() -> Self {
        Self { entries: LISTINGS }
    }
}

impl SymbolDirectory {
    /// Resolve one token or phrase. Returns `Ok(None)` when the input does
    /// not reference any known listing.
    ///
    /// Tie-break order: exact symbol match, then the sole primary listing
    /// among name matches, then the alphabetically first secondary listing.
    /// Several distinct primary listings matching the same phrase is a real
    /// ambiguity and fails.
    pub fn resolve(
        &self,
        phrase: &str,
    ) -> std::result::Result<Option<String>, ClassificationError> {
        let upper = phrase.to_uppercase();

        if let Some(entry) = self.entries.iter().find(|entry| entry.symbol == upper) {
            return Ok(Some(entry.symbol.to_string()));
        }

        if !upper.contains(' ') && GENERIC_NAME_WORDS.contains(&upper.as_str()) {
            return Ok(None);
        }

        let candidates: Vec<&SymbolEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.name == upper
                    || entry.name.split(' ').any(|word| word == upper)
                    || (upper.contains(' ') && entry.name.contains(&upper))
            })
            .collect();

        match candidates.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.symbol.to_string())),
            _ => {
                let primaries: Vec<&&SymbolEntry> =
                    candidates.iter().filter(|entry| entry.primary).collect();
                match primaries.as_slice() {
                    [only] => Ok(Some(only.symbol.to_string())),
                    [] => {
                        // Secondary listings only; entries are kept sorted,
                        // so the first candidate is the alphabetical pick.
                        Ok(Some(candidates[0].symbol.to_string()))
                    }
                    _ => Err(ClassificationError::AmbiguousTicker {
                        name: phrase.to_string(),
                        candidates: primaries
                            .iter()
                            .map(|entry| entry.symbol.to_string())
                            .collect(),
                    }),
                }
            }
        }
    }
}

/// Free-text intent, ordered from most to least specific. The first pattern
/// that matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Portfolio,
    DeepDive,
    Comparison,
    FullAnalysis,
    Technical,
    Fundamental,
    Sentiment,
    PriceCheck,
}

impl Intent {
    fn path(self) -> Path {
        match self {
            Self::Portfolio => Path::Portfolio,
            Self::DeepDive => Path::DeepDive,
            Self::Comparison => Path::Comparison,
            Self::FullAnalysis => Path::Standard,
            Self::Technical | Self::Fundamental | Self::Sentiment => Path::SingleAspect,
            Self::PriceCheck => Path::PriceOnly,
        }
    }

    fn aspect(self) -> Option<AgentRole> {
        match self {
            Self::Technical => Some(AgentRole::Technical),
            Self::Fundamental => Some(AgentRole::Fundamental),
            Self::Sentiment => Some(AgentRole::MarketIntel),
            _ => None,
        }
    }
}

const PATTERNS: &[(Intent, &str)] = &[
    (Intent::Portfolio, r"(?i)\b(my\s+)?portfolio\b|\bmy\s+holdings\b"),
    (
        Intent::DeepDive,
        r"(?i)\bdeep\s*dive\b|\bdetailed\s+analysis\b|\bin-?depth\b|\bthorough(ly)?\b|\bcomprehensive\b",
    ),
    (
        Intent::Comparison,
        r"(?i)\bcompare\b|\bvs\.?\b|\bversus\b|\bagainst\b|\bwhich\s+is\s+better\b",
    ),
    (
        Intent::FullAnalysis,
        r"(?i)\banaly[sz]e\b|\banalysis\b|\bshould\s+i\s+(buy|sell|hold)\b|\brecommend\b|\bopinion\b|\boutlook\b|\breview\b",
    ),
    (
        Intent::Technical,
        r"(?i)\btechnicals?\b|\bchart\b|\btrend\b|\bsupport\b|\bresistance\b|\bbreakout\b|\bmoving\s+average\b|\brsi\b|\bmacd\b|\bmomentum\b",
    ),
    (
        Intent::Fundamental,
        r"(?i)\bfundamentals?\b|\bvaluation\b|\bp/?e\s+ratio\b|\bearnings\b|\bbalance\s+sheet\b|\bfinancials\b|\brevenue\b|\bdividends?\b",
    ),
    (
        Intent::Sentiment,
        r"(?i)\bnews\b|\bsentiment\b|\bheadlines?\b|\bbuzz\b|\barticles?\b",
    ),
    (
        Intent::PriceCheck,
        r"(?i)\bprice\b|\bquote\b|\btrading\s+at\b|\bhow\s+much\b|\bltp\b",
    ),
];

/// Stateless classifier. Built once at startup; `classify` is pure.
pub struct IntentClassifier {
    directory: SymbolDirectory,
    patterns: Vec<(Intent, Regex)>,
}

impl IntentClassifier {
    pub fn new() -> Result<Self> {
        Self::with_directory(SymbolDirectory::default())
    }

    pub fn with_directory(directory: SymbolDirectory) -> Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(intent, pattern)| {
                Regex::new(pattern)
                    .map(|regex| (*intent, regex))
                    .map_err(|err| AdvisorError::Config(format!("bad intent pattern: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            directory,
            patterns,
        })
    }

    /// Map raw query text to a routing decision.
    pub fn classify(
        &self,
        text: &str,
    ) -> std::result::Result<Classification, ClassificationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClassificationError::UnrecognizedIntent);
        }

        if text.starts_with('/') {
            return self.classify_command(text);
        }

        let tickers = self.extract_tickers(text)?;
        let intent = self
            .patterns
            .iter()
            .find(|(_, regex)| regex.is_match(text))
            .map(|(intent, _)| *intent);

        let intent = match intent {
            Some(intent) => intent,
            // Bare ticker mention defaults to a full analysis.
            None if !tickers.is_empty() => Intent::FullAnalysis,
            None => return Err(ClassificationError::UnrecognizedIntent),
        };

        build_classification(intent.path(), intent.aspect(), tickers)
    }

    fn classify_command(
        &self,
        text: &str,
    ) -> std::result::Result<Classification, ClassificationError> {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or_default().to_lowercase();

        let (path, aspect) = match command.as_str() {
            "/p" | "/price" => (Path::PriceOnly, None),
            "/t" | "/tech" => (Path::SingleAspect, Some(AgentRole::Technical)),
            "/f" | "/fund" => (Path::SingleAspect, Some(AgentRole::Fundamental)),
            "/n" | "/news" => (Path::SingleAspect, Some(AgentRole::MarketIntel)),
            "/a" | "/analyze" => (Path::Standard, None),
            "/dd" | "/deepdive" => (Path::DeepDive, None),
            "/c" | "/compare" => (Path::Comparison, None),
            "/portfolio" => (Path::Portfolio, None),
            _ => return Err(ClassificationError::UnrecognizedIntent),
        };

        // Command arguments are explicit symbols; unknown ones pass through
        // uppercased so newly listed tickers keep working.
        let mut tickers = Vec::new();
        for arg in parts {
            let symbol = match self.directory.resolve(arg)? {
                Some(symbol) => symbol,
                None => {
                    let upper = arg.to_uppercase();
                    if !looks_like_symbol(&upper) {
                        return Err(ClassificationError::MissingTicker);
                    }
                    upper
                }
            };
            if !tickers.contains(&symbol) {
                tickers.push(symbol);
            }
        }

        build_classification(path, aspect, tickers)
    }

    /// Extract up to two ticker references from free text. Two-word company
    /// names are tried before single tokens so "hdfc bank" resolves as one
    /// reference.
    fn extract_tickers(
        &self,
        text: &str,
    ) -> std::result::Result<Vec<String>, ClassificationError> {
        let tokens: Vec<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '&' || c == '-'))
            .filter(|token| !token.is_empty())
            .collect();

        let mut tickers: Vec<String> = Vec::new();
        let mut push = |symbol: String, tickers: &mut Vec<String>| {
            if !tickers.contains(&symbol) {
                tickers.push(symbol);
            }
        };

        let mut index = 0;
        while index < tokens.len() {
            if index + 1 < tokens.len() {
                let phrase = format!("{} {}", tokens[index], tokens[index + 1]);
                if let Some(symbol) = self.directory.resolve(&phrase)? {
                    push(symbol, &mut tickers);
                    index += 2;
                    continue;
                }
            }

            let token = tokens[index];
            let upper = token.to_uppercase();
            if SYMBOL_STOPWORDS.contains(&upper.as_str()) {
                index += 1;
                continue;
            }

            if let Some(symbol) = self.directory.resolve(token)? {
                push(symbol, &mut tickers);
            } else if token.chars().all(|c| c.is_ascii_uppercase() || c == '&')
                && looks_like_symbol(&upper)
            {
                // Explicitly uppercased token: trust the user's symbol.
                push(upper, &mut tickers);
            }
            index += 1;
        }

        tickers.truncate(2);
        Ok(tickers)
    }
}

fn looks_like_symbol(upper: &str) -> bool {
    (2..=12).contains(&upper.len())
        && upper
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '&' || c == '-')
        && upper.chars().any(|c| c.is_ascii_uppercase())
}

fn build_classification(
    path: Path,
    aspect: Option<AgentRole>,
    tickers: Vec<String>,
) -> std::result::Result<Classification, ClassificationError> {
    match path {
        Path::Portfolio => {}
        Path::Comparison if tickers.len() < 2 => {
            return Err(ClassificationError::ComparisonNeedsTwo);
        }
        _ if tickers.is_empty() => return Err(ClassificationError::MissingTicker),
        _ => {}
    }

    let requested: Vec<AgentRole> = match path {
        Path::PriceOnly | Path::Portfolio => Vec::new(),
        Path::SingleAspect => aspect.into_iter().collect(),
        Path::Standard | Path::Comparison | Path::DeepDive => AgentRole::ALL.to_vec(),
    };

    Ok(Classification::new(path, tickers, requested))
}
