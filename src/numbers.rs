//! English cardinal number words for the letter of protest.

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [(u64, &str); 4] = [
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

/// `42` -> `"forty-two"`, `105` -> `"one hundred and five"`.
pub fn to_words(n: u64) -> String {
    if n < 1000 {
        return below_thousand(n);
    }

    let mut parts = Vec::new();
    let mut rest = n;
    for (scale, name) in SCALES {
        if rest >= scale {
            parts.push(format!("{} {}", to_words(rest / scale), name));
            rest %= scale;
        }
    }
    match rest {
        0 => {}
        1..=99 => parts.push(format!("and {}", below_thousand(rest))),
        _ => parts.push(below_thousand(rest)),
    }
    parts.join(" ")
}

/// Number words with the first letter upper-cased.
pub fn to_capitalized_words(n: u64) -> String {
    let words = to_words(n);
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => words,
    }
}

fn below_thousand(n: u64) -> String {
    match n {
        0..=19 => ONES[n as usize].to_string(),
        20..=99 => match n % 10 {
            0 => TENS[(n / 10) as usize].to_string(),
            unit => format!("{}-{}", TENS[(n / 10) as usize], ONES[unit as usize]),
        },
        _ => match n % 100 {
            0 => format!("{} hundred", ONES[(n / 100) as usize]),
            rest => format!("{} hundred and {}", ONES[(n / 100) as usize], below_thousand(rest)),
        },
    }
}
