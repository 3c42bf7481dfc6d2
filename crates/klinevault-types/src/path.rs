//! Remote key construction for Binance Vision archives.
//!
//! Kline-shaped kinds live one directory deeper, under their interval:
//!
//! ```text
//! data/{segment}/{frequency}/{kind}/{SYMBOL}/{interval}/{SYMBOL}-{interval}-{DATE}.zip
//! data/{segment}/{frequency}/{kind}/{SYMBOL}/{SYMBOL}-{kind}-{DATE}.zip
//! ```

use crate::{
    ARCHIVE_SUFFIX, CHECKSUM_SUFFIX, DataKind, DateToken, Frequency, KlineInterval,
    KlineVaultError, MarketSegment, RemoteFileRef, Result, Symbol,
};

/// Validated key layout for one (segment, kind, frequency, interval) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathBuilder {
    /// Layout of kline-shaped kinds.
    Kline {
        /// Market segment.
        segment: MarketSegment,
        /// Kline-shaped data kind.
        kind: DataKind,
        /// Publication frequency.
        frequency: Frequency,
        /// Candle interval.
        interval: KlineInterval,
    },
    /// Layout of every other kind.
    Generic {
        /// Market segment.
        segment: MarketSegment,
        /// Data kind.
        kind: DataKind,
        /// Publication frequency.
        frequency: Frequency,
    },
}

impl PathBuilder {
    /// Creates a builder, rejecting combinations the store never publishes.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::InvalidSchema`] when a kline-shaped kind has
    /// no interval, a non-kline kind has one, or a futures-only kind is
    /// requested for the spot segment.
    pub fn new(
        segment: MarketSegment,
        kind: DataKind,
        frequency: Frequency,
        interval: Option<KlineInterval>,
    ) -> Result<Self> {
        if kind.is_futures_only() && segment == MarketSegment::Spot {
            return Err(KlineVaultError::InvalidSchema(format!(
                "{kind} is only published for futures segments"
            )));
        }
        match (kind.is_kline(), interval) {
            (true, Some(interval)) => Ok(Self::Kline {
                segment,
                kind,
                frequency,
                interval,
            }),
            (true, None) => Err(KlineVaultError::InvalidSchema(format!(
                "{kind} requires a kline interval"
            ))),
            (false, None) => Ok(Self::Generic {
                segment,
                kind,
                frequency,
            }),
            (false, Some(interval)) => Err(KlineVaultError::InvalidSchema(format!(
                "{kind} does not take a kline interval (got {interval})"
            ))),
        }
    }

    /// Returns the market segment.
    #[must_use]
    pub const fn segment(&self) -> MarketSegment {
        match self {
            Self::Kline { segment, .. } | Self::Generic { segment, .. } => *segment,
        }
    }

    /// Returns the data kind.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Kline { kind, .. } | Self::Generic { kind, .. } => *kind,
        }
    }

    /// Returns the publication frequency.
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        match self {
            Self::Kline { frequency, .. } | Self::Generic { frequency, .. } => *frequency,
        }
    }

    /// Returns the interval for the kline layout.
    #[must_use]
    pub const fn interval(&self) -> Option<KlineInterval> {
        match self {
            Self::Kline { interval, .. } => Some(*interval),
            Self::Generic { .. } => None,
        }
    }

    /// Returns the directory whose children are the symbols,
    /// e.g. `data/spot/daily/klines/`.
    #[must_use]
    pub fn root_prefix(&self) -> String {
        format!(
            "data/{}/{}/{}/",
            self.segment().path_token(),
            self.frequency().path_token(),
            self.kind().path_token()
        )
    }

    /// Returns the directory holding one symbol's archives.
    #[must_use]
    pub fn symbol_prefix(&self, symbol: &Symbol) -> String {
        match self {
            Self::Kline { interval, .. } => {
                format!("{}{symbol}/{interval}/", self.root_prefix())
            }
            Self::Generic { .. } => format!("{}{symbol}/", self.root_prefix()),
        }
    }

    /// Returns the archive file name for a symbol and date.
    #[must_use]
    pub fn file_name(&self, symbol: &Symbol, date: &DateToken) -> String {
        match self {
            Self::Kline { interval, .. } => format!("{symbol}-{interval}-{date}{ARCHIVE_SUFFIX}"),
            Self::Generic { kind, .. } => format!("{symbol}-{kind}-{date}{ARCHIVE_SUFFIX}"),
        }
    }

    /// Builds the reference for one dated archive.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::InvalidSchema`] for an empty symbol or when
    /// the date granularity does not match the frequency.
    pub fn build(&self, symbol: &Symbol, date: DateToken) -> Result<RemoteFileRef> {
        if symbol.as_str().is_empty() || symbol.as_str().contains('/') {
            return Err(KlineVaultError::InvalidSchema(format!(
                "invalid symbol '{symbol}'"
            )));
        }
        if date.frequency() != self.frequency() {
            return Err(KlineVaultError::InvalidSchema(format!(
                "date token {date} does not match {} frequency",
                self.frequency()
            )));
        }
        let key = format!(
            "{}{}",
            self.symbol_prefix(symbol),
            self.file_name(symbol, &date)
        );
        Ok(RemoteFileRef::new(
            self.segment(),
            self.kind(),
            self.frequency(),
            symbol.clone(),
            self.interval(),
            date,
            key,
        ))
    }

    /// Rebuilds the reference for a listed key, if the key belongs to this
    /// layout and symbol.
    #[must_use]
    pub fn from_key(&self, symbol: &Symbol, key: &str) -> Option<RemoteFileRef> {
        let date = parse_date_from_key(key).ok()?;
        self.build(symbol, date)
            .ok()
            .filter(|file| file.key() == key)
    }
}

/// Builds the reference for one dated archive.
///
/// # Errors
///
/// Returns [`KlineVaultError::InvalidSchema`] for any invalid combination.
pub fn build_key(
    segment: MarketSegment,
    kind: DataKind,
    frequency: Frequency,
    symbol: &Symbol,
    interval: Option<KlineInterval>,
    date: DateToken,
) -> Result<RemoteFileRef> {
    PathBuilder::new(segment, kind, frequency, interval)?.build(symbol, date)
}

/// Extracts the date token from an archive or sidecar key.
///
/// # Errors
///
/// Returns [`KlineVaultError::InvalidSchema`] if the key does not end in a
/// dated archive name.
pub fn parse_date_from_key(key: &str) -> Result<DateToken> {
    let invalid = || KlineVaultError::InvalidSchema(format!("no date token in key '{key}'"));

    let name = key.rsplit('/').next().unwrap_or(key);
    let name = name.strip_suffix(CHECKSUM_SUFFIX).unwrap_or(name);
    let stem = name.strip_suffix(ARCHIVE_SUFFIX).ok_or_else(invalid)?;

    [10, 7]
        .into_iter()
        .filter_map(|len| {
            let split = stem.len().checked_sub(len)?;
            let (head, token) = (stem.get(..split)?, stem.get(split..)?);
            head.ends_with('-').then(|| DateToken::parse(token)).flatten()
        })
        .next()
        .ok_or_else(invalid)
}
