//! Named groups of countries that can be expanded into a policy

struct Region {
    key: &'static str,
    name: &'static str,
    members: &'static [&'static str],
}

const REGIONS: &[Region] = &[
    Region {
        key: "EU-27",
        name: "European Union (27 members)",
        members: &[
            "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE",
            "IT", "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
        ],
    },
    Region {
        key: "SCHENGEN",
        name: "Schengen Area",
        members: &[
            "AT", "BE", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IS", "IT", "LV", "LI",
            "LT", "LU", "MT", "NL", "NO", "PL", "PT", "SK", "SI", "ES", "SE", "CH",
        ],
    },
    Region {
        key: "BRICS",
        name: "BRICS",
        members: &["BR", "RU", "IN", "CN", "ZA"],
    },
    Region {
        key: "G7",
        name: "Group of Seven",
        members: &["CA", "FR", "DE", "IT", "JP", "GB", "US"],
    },
    Region {
        key: "G20",
        name: "Group of Twenty",
        members: &[
            "AR", "AU", "BR", "CA", "CN", "FR", "DE", "IN", "ID", "IT", "JP", "MX", "RU", "SA",
            "ZA", "KR", "TR", "GB", "US",
        ],
    },
    Region {
        key: "NATO",
        name: "NATO members",
        members: &[
            "AL", "BE", "BG", "CA", "HR", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IS",
            "IT", "LV", "LT", "LU", "ME", "NL", "MK", "NO", "PL", "PT", "RO", "SK", "SI", "ES",
            "SE", "TR", "GB", "US",
        ],
    },
    Region {
        key: "ASEAN",
        name: "Association of Southeast Asian Nations",
        members: &["BN", "KH", "ID", "LA", "MY", "MM", "PH", "SG", "TH", "VN"],
    },
    Region {
        key: "MERCOSUR",
        name: "Mercosur",
        members: &["AR", "BR", "PY", "UY"],
    },
    Region {
        key: "AFRICAN_UNION",
        name: "African Union",
        members: &[
            "DZ", "AO", "BJ", "BW", "BF", "BI", "CM", "CV", "CF", "TD", "KM", "CG", "CD", "CI",
            "DJ", "EG", "GQ", "ER", "SZ", "ET", "GA", "GM", "GH", "GN", "GW", "KE", "LS", "LR",
            "LY", "MG", "MW", "ML", "MR", "MU", "MA", "MZ", "NA", "NE", "NG", "RW", "ST", "SN",
            "SC", "SL", "SO", "ZA", "SS", "SD", "TZ", "TG", "TN", "UG", "ZM", "ZW",
        ],
    },
    Region {
        key: "ARAB_LEAGUE",
        name: "Arab League",
        members: &[
            "DZ", "BH", "KM", "DJ", "EG", "IQ", "JO", "KW", "LB", "LY", "MR", "MA", "OM", "PS",
            "QA", "SA", "SO", "SD", "SY", "TN", "AE", "YE",
        ],
    },
    Region {
        key: "CARIBBEAN",
        name: "Caribbean Community (CARICOM)",
        members: &[
            "AG", "BS", "BB", "BZ", "DM", "GD", "GY", "HT", "JM", "KN", "LC", "VC", "SR", "TT",
        ],
    },
    Region {
        key: "NORDIC",
        name: "Nordic countries",
        members: &["DK", "FI", "IS", "NO", "SE"],
    },
    Region {
        key: "BALTICS",
        name: "Baltic states",
        members: &["EE", "LV", "LT"],
    },
    Region {
        key: "NORTH_AMERICA",
        name: "North America",
        members: &["CA", "MX", "US"],
    },
    Region {
        key: "CENTRAL_AMERICA",
        name: "Central America",
        members: &["BZ", "CR", "SV", "GT", "HN", "NI", "PA"],
    },
    Region {
        key: "SOUTH_AMERICA",
        name: "South America",
        members: &[
            "AR", "BO", "BR", "CL", "CO", "EC", "GY", "PY", "PE", "SR", "UY", "VE",
        ],
    },
    Region {
        key: "MIDDLE_EAST",
        name: "Middle East",
        members: &[
            "BH", "IQ", "IR", "IL", "JO", "KW", "LB", "OM", "PS", "QA", "SA", "SY", "TR", "AE",
            "YE",
        ],
    },
];

/// Member codes of a region, matched case-insensitively
pub fn members(key: &str) -> Option<&'static [&'static str]> {
    find(key).map(|region| region.members)
}

/// Display name of a region
pub fn display_name(key: &str) -> Option<&'static str> {
    find(key).map(|region| region.name)
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    REGIONS.iter().map(|region| region.key)
}

fn find(key: &str) -> Option<&'static Region> {
    let key = key.trim();
    REGIONS
        .iter()
        .find(|region| region.key.eq_ignore_ascii_case(key))
}
