use anyhow::{anyhow, bail, Context, Result};

/// parse a string of '0's and '1's into a vector of bits, most significant bit first
pub fn bit_vec_from_string(s: &str) -> Result<Vec<bool>> {
    s.chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(anyhow!("Invalid character in bit string: {c:?}")),
        })
        .collect()
}

/// convert a vector of bits (most significant bit first) into an integer
pub fn bit_vec_to_int(bits: &[bool]) -> u32 {
    bits.iter().fold(0, |acc, &bit| (acc << 1) | u32::from(bit))
}

/// Parse a program image: one instruction per line, either 32 binary digits or a `0x` prefixed
/// hex word. Blank lines and `#` or `//` comments are skipped.
pub fn parse_program(text: &str) -> Result<Vec<u32>> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = strip_comment(line).trim();
            (!line.is_empty()).then_some((index + 1, line))
        })
        .map(|(line_number, line)| {
            parse_instruction(line).with_context(|| format!("line {line_number}: {line:?}"))
        })
        .collect()
}

fn strip_comment(line: &str) -> &str {
    let end = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

fn parse_instruction(word: &str) -> Result<u32> {
    if let Some(hex) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .with_context(|| format!("Invalid hex instruction {word}"));
    }

    let bits = bit_vec_from_string(word)?;
    if bits.len() != 32 {
        bail!("Expected 32 bits, found {}", bits.len());
    }
    Ok(bit_vec_to_int(&bits))
}
