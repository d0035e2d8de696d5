//! `Accept` header parsing and quality lookup (RFC 7231 §5.3.2).

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptItem {
    /// Lower-cased `type/subtype`, possibly with wildcards
    pub media_type: String,
    /// Quality in `0.0..=1.0`
    pub quality: f32,
}

impl AcceptItem {
    /// How specific the entry is: 2 for `type/subtype`, 1 for `type/*`, 0 for `*/*`.
    fn specificity(&self) -> u8 {
        match self.media_type.split_once('/') {
            Some(("*", _)) => 0,
            Some((_, "*")) => 1,
            _ => 2,
        }
    }

    fn matches(&self, offered: &str) -> bool {
        let (Some((ctype, csub)), Some((otype, osub))) =
            (self.media_type.split_once('/'), offered.split_once('/'))
        else {
            return false;
        };
        (ctype == "*" || ctype.eq_ignore_ascii_case(otype))
            && (csub == "*" || csub.eq_ignore_ascii_case(osub))
    }
}

/// Client preferences from an `Accept` header, ordered by descending quality.
///
/// Entries with equal quality keep the order they had in the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptList {
    items: Vec<AcceptItem>,
}

impl AcceptList {
    /// Parse a raw header value. Malformed entries (no `/`, bad `q`) are skipped.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut items: Vec<AcceptItem> = header.split(',').filter_map(parse_item).collect();
        // stable: equal qualities keep header order
        items.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        Self { items }
    }

    /// `true` when the client expressed no preference at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate entries, best first.
    pub fn iter(&self) -> impl Iterator<Item = &AcceptItem> {
        self.items.iter()
    }

    /// Requested media types ordered by descending quality.
    #[must_use]
    pub fn media_types(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.media_type.as_str()).collect()
    }

    /// Quality the client assigns to `offered`.
    ///
    /// The most specific matching entry decides; `0.0` when nothing matches.
    #[must_use]
    pub fn quality(&self, offered: &str) -> f32 {
        let mut best: Option<(u8, f32)> = None;
        for item in self.items.iter().filter(|i| i.matches(offered)) {
            let spec = item.specificity();
            best = match best {
                Some((s, q)) if s > spec || (s == spec && q >= item.quality) => Some((s, q)),
                _ => Some((spec, item.quality)),
            };
        }
        best.map_or(0.0, |(_, q)| q)
    }

    /// Pick the offered type with the highest quality.
    ///
    /// Ties go to the type offered first, so callers pass their types in
    /// registration order. Returns `default` when nothing offered is acceptable
    /// or the list is empty.
    pub fn best_match<'a, I>(&self, offered: I, default: Option<&'a str>) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(&'a str, f32)> = None;
        for candidate in offered {
            let q = self.quality(candidate);
            if q > 0.0 && best.map_or(true, |(_, bq)| q > bq) {
                best = Some((candidate, q));
            }
        }
        best.map(|(m, _)| m).or(default)
    }
}

fn parse_item(raw: &str) -> Option<AcceptItem> {
    let mut parts = raw.split(';');
    let media_type = parts.next()?.trim().to_ascii_lowercase();
    if !media_type.contains('/') {
        return None;
    }
    let mut quality = 1.0_f32;
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("q") {
            quality = value.trim().parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q))?;
        }
    }
    Some(AcceptItem {
        media_type,
        quality,
    })
}
