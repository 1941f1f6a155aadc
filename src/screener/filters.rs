//! Finviz filter names and options, mapped to the URL codes the screener expects.

use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown screener filter '{0}'")]
    UnknownFilter(String),
    #[error("unknown option '{option}' for filter '{filter}'")]
    UnknownOption { filter: String, option: String },
}

struct FilterDef {
    name: &'static str,
    prefix: &'static str,
    options: &'static [(&'static str, &'static str)],
}

const FILTERS: &[FilterDef] = &[
    FilterDef {
        name: "Sales growthqtr over qtr",
        prefix: "fa_salesqoq",
        options: &[
            ("Negative (<0%)", "neg"),
            ("Positive (>0%)", "pos"),
            ("Positive Low (0-10%)", "poslow"),
            ("High (>25%)", "high"),
            ("Under 5%", "u5"),
            ("Under 10%", "u10"),
            ("Under 15%", "u15"),
            ("Under 20%", "u20"),
            ("Under 25%", "u25"),
            ("Under 30%", "u30"),
            ("Over 5%", "o5"),
            ("Over 10%", "o10"),
            ("Over 15%", "o15"),
            ("Over 20%", "o20"),
            ("Over 25%", "o25"),
            ("Over 30%", "o30"),
        ],
    },
    FilterDef {
        name: "52-Week High/Low",
        prefix: "ta_highlow52w",
        options: &[
            ("New High", "nh"),
            ("New Low", "nl"),
            ("5% or more below High", "b5h"),
            ("10% or more below High", "b10h"),
            ("15% or more below High", "b15h"),
            ("20% or more below High", "b20h"),
            ("30% or more below High", "b30h"),
            ("40% or more below High", "b40h"),
            ("50% or more below High", "b50h"),
            ("0-3% below High", "b0to3h"),
            ("0-5% below High", "b0to5h"),
            ("0-10% below High", "b0to10h"),
            ("5% or more above Low", "a5h"),
            ("10% or more above Low", "a10h"),
            ("0-3% above Low", "a0to3h"),
            ("0-5% above Low", "a0to5h"),
            ("0-10% above Low", "a0to10h"),
        ],
    },
    FilterDef {
        name: "Market Cap.",
        prefix: "cap",
        options: &[
            ("Mega ($200bln and more)", "mega"),
            ("Large ($10bln to $200bln)", "large"),
            ("Mid ($2bln to $10bln)", "mid"),
            ("Small ($300mln to $2bln)", "small"),
            ("Micro ($50mln to $300mln)", "micro"),
            ("Nano (under $50mln)", "nano"),
            ("+Large (over $10bln)", "largeover"),
            ("+Mid (over $2bln)", "midover"),
            ("+Small (over $300mln)", "smallover"),
            ("+Micro (over $50mln)", "microover"),
        ],
    },
    FilterDef {
        name: "Average Volume",
        prefix: "sh_avgvol",
        options: &[
            ("Over 100K", "o100"),
            ("Over 200K", "o200"),
            ("Over 500K", "o500"),
            ("Over 1M", "o1000"),
            ("Over 2M", "o2000"),
        ],
    },
];

/// A set of translated filter codes, e.g. `fa_salesqoq_o20`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    codes: Vec<String>,
}

impl FilterSet {
    pub fn from_names(filters: &BTreeMap<String, String>) -> Result<Self, FilterError> {
        let codes = filters
            .iter()
            .map(|(name, option)| filter_code(name, option))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codes })
    }

    /// Comma-joined form used in the `f=` query parameter.
    pub fn query_value(&self) -> String {
        self.codes.join(",")
    }
}

fn filter_code(name: &str, option: &str) -> Result<String, FilterError> {
    let def = FILTERS
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| FilterError::UnknownFilter(name.to_string()))?;
    let (_, code) = def
        .options
        .iter()
        .find(|(label, _)| *label == option)
        .ok_or_else(|| FilterError::UnknownOption {
            filter: name.to_string(),
            option: option.to_string(),
        })?;
    Ok(format!("{}_{}", def.prefix, code))
}
