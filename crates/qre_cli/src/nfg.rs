//! Reader for the normal-form game text representation.
//!
//! Two body forms are accepted after the common header: a flat list of
//! payoffs (per contingency, one value per player) and the outcome table
//! form (named outcomes with per-player payoffs, then one outcome index
//! per contingency, index 0 meaning all payoffs are zero). Contingencies
//! are ordered with the first player's strategy varying fastest.

use anyhow::{bail, Context, Result};
use qre_core::game::NormalFormGame;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    Comma,
    Text(String),
    Number(f64),
    Ident(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => text.push(ch),
                        None => bail!("Unterminated string in game file"),
                    }
                }
                tokens.push(Token::Text(text));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '{' | '}' | ',' | '"') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                match word.parse::<f64>() {
                    Ok(value) => tokens.push(Token::Number(value)),
                    Err(_) => tokens.push(Token::Ident(word)),
                }
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .context("Unexpected end of game file")?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        let got = self.next()?;
        if got != token {
            bail!("Expected {:?}, found {:?}", token, got);
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(word) => Ok(word),
            other => bail!("Expected identifier, found {:?}", other),
        }
    }

    fn text(&mut self) -> Result<String> {
        match self.next()? {
            Token::Text(text) => Ok(text),
            other => bail!("Expected quoted string, found {:?}", other),
        }
    }

    fn number(&mut self) -> Result<f64> {
        match self.next()? {
            Token::Number(value) => Ok(value),
            other => bail!("Expected number, found {:?}", other),
        }
    }

    /// A brace-delimited list of quoted strings.
    fn text_list(&mut self) -> Result<Vec<String>> {
        self.expect(Token::LBrace)?;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => items.push(self.text()?),
            }
        }
    }

    /// Strategy counts: either a list of numbers or a list of per-player
    /// strategy-name lists.
    fn strategy_counts(&mut self, num_players: usize) -> Result<Vec<usize>> {
        self.expect(Token::LBrace)?;
        let mut counts = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::LBrace) => {
                    counts.push(self.text_list()?.len());
                }
                Some(Token::Number(_)) => {
                    let value = self.number()?;
                    if value < 1.0 || value.fract() != 0.0 {
                        bail!("Strategy count must be a positive integer, found {}", value);
                    }
                    counts.push(value as usize);
                }
                other => bail!("Expected strategy count or name list, found {:?}", other),
            }
        }
        if counts.len() != num_players {
            bail!(
                "Game declares {} players but {} strategy sets.",
                num_players,
                counts.len()
            );
        }
        Ok(counts)
    }
}

pub fn parse_game(input: &str) -> Result<NormalFormGame> {
    let tokens = tokenize(input)?;
    let mut p = Parser { tokens, pos: 0 };

    let magic = p.ident().context("Game file must start with the NFG header")?;
    if magic != "NFG" {
        bail!("Not a normal-form game file (header `{}`)", magic);
    }
    let version = p.number()?;
    if version != 1.0 {
        bail!("Unsupported NFG version {}", version);
    }
    // Payoff precision marker, R (real) or D (decimal); read and ignored.
    p.ident()?;

    let title = p.text()?;
    let players = p.text_list()?;
    let counts = p.strategy_counts(players.len())?;

    let num_players = counts.len();
    let num_contingencies: usize = counts.iter().product();

    // Optional comment string between the header and the body.
    if matches!(p.peek(), Some(Token::Text(_))) {
        p.pos += 1;
    }

    let mut tables = vec![vec![0.0; num_contingencies]; num_players];

    if matches!(p.peek(), Some(Token::LBrace)) {
        // Outcome form: a table of named outcomes, then one outcome index
        // per contingency.
        p.pos += 1;
        let mut outcomes: Vec<Vec<f64>> = Vec::new();
        loop {
            match p.peek() {
                Some(Token::RBrace) => {
                    p.pos += 1;
                    break;
                }
                Some(Token::LBrace) => {
                    p.pos += 1;
                    let _name = p.text()?;
                    let mut payoffs = Vec::with_capacity(num_players);
                    for _ in 0..num_players {
                        payoffs.push(p.number()?);
                        if matches!(p.peek(), Some(Token::Comma)) {
                            p.pos += 1;
                        }
                    }
                    p.expect(Token::RBrace)?;
                    outcomes.push(payoffs);
                }
                other => bail!("Expected outcome entry, found {:?}", other),
            }
        }

        for c in 0..num_contingencies {
            let index = p
                .number()
                .with_context(|| format!("Missing outcome index for contingency {}", c + 1))?;
            if index.fract() != 0.0 || index < 0.0 {
                bail!("Outcome index must be a nonnegative integer, found {}", index);
            }
            let index = index as usize;
            if index == 0 {
                continue;
            }
            let outcome = outcomes
                .get(index - 1)
                .with_context(|| format!("Outcome index {} out of range", index))?;
            for pl in 0..num_players {
                tables[pl][c] = outcome[pl];
            }
        }
    } else {
        // Payoff form: per contingency, one payoff per player.
        for c in 0..num_contingencies {
            for pl in 0..num_players {
                tables[pl][c] = p.number().with_context(|| {
                    format!(
                        "Payoff list too short: expected {} values",
                        num_contingencies * num_players
                    )
                })?;
            }
        }
    }

    NormalFormGame::new(title, &counts, tables)
}
