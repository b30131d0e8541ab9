//! # Command
//!
//! The console command grammar. Only the first token is case-insensitive;
//! path arguments are passed through verbatim.

use std::str::FromStr;

#[derive(Debug)]
pub enum Command {
    Cd(String),
    Cdup,
    Pwd,
    Ls(Option<String>),
    Get(String),
    Passive,
    Active,
    Extended(bool),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return Err(String::from("Unrecognized command: "));
        };

        match first.to_ascii_lowercase().as_str() {
            "cd" => match tokens[..] {
                [_, path] => Ok(Self::Cd(path.to_string())),
                _ => Err(String::from("Usage: cd <path>")),
            },
            "cdup" => match tokens.len() {
                1 => Ok(Self::Cdup),
                _ => Err(String::from("Usage: cdup")),
            },
            "pwd" => match tokens.len() {
                1 => Ok(Self::Pwd),
                _ => Err(String::from("Usage: pwd")),
            },
            "ls" => match tokens[..] {
                [_] => Ok(Self::Ls(None)),
                [_, path] => Ok(Self::Ls(Some(path.to_string()))),
                _ => Err(String::from("Usage: ls [path]")),
            },
            "get" => match tokens[..] {
                [_, file] => Ok(Self::Get(file.to_string())),
                _ => Err(String::from("Usage: get <filename>")),
            },
            "pasv" | "passive" => match tokens.len() {
                1 => Ok(Self::Passive),
                _ => Err(String::from("Usage: passive")),
            },
            "active" => match tokens.len() {
                1 => Ok(Self::Active),
                _ => Err(String::from("Usage: active")),
            },
            "ext" | "extended" => match tokens[..] {
                [_, "on"] => Ok(Self::Extended(true)),
                [_, "off"] => Ok(Self::Extended(false)),
                _ => Err(String::from("Usage: extended <on|off>")),
            },
            "help" => match tokens.len() {
                1 => Ok(Self::Help),
                _ => Err(String::from("Usage: help")),
            },
            "exit" | "quit" => match tokens.len() {
                1 => Ok(Self::Quit),
                _ => Err(String::from("Usage: exit")),
            },
            other => Err(format!("Unrecognized command: {other}")),
        }
    }
}
