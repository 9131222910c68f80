//! Line commands typed at the prompt.

use shared::domain::{Coordinate, GodCard, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewGame,
    God { player: PlayerId, card: GodCard },
    Confirm,
    Click(Coordinate),
    Undo,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  new                 start a new game
  god <A|B> <card>    pick a god card (None, Demeter, Hephaestus, Minotaur, Pan, Apollo)
  confirm             submit both god cards
  click <x> <y>       click a cell (the word 'click' is optional)
  undo                deselect the current worker
  show                print the board again
  help                this text
  quit                leave";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["new"] => Ok(Command::NewGame),
        ["god", player, card] => {
            let player = player.to_ascii_uppercase();
            if player != "A" && player != "B" {
                return Err(format!("unknown player '{player}', expected A or B"));
            }
            let card = card.parse::<GodCard>().map_err(|error| error.to_string())?;
            Ok(Command::God {
                player: PlayerId::new(player),
                card,
            })
        }
        ["confirm"] => Ok(Command::Confirm),
        ["click", x, y] | [x, y] => Ok(Command::Click(parse_coordinate(x, y)?)),
        ["undo"] => Ok(Command::Undo),
        ["show"] | [] => Ok(Command::Show),
        ["help"] => Ok(Command::Help),
        ["quit"] | ["exit"] => Ok(Command::Quit),
        _ => Err(format!("unrecognised command '{}'; type 'help'", line.trim())),
    }
}

fn parse_coordinate(x: &str, y: &str) -> Result<Coordinate, String> {
    let x = x
        .parse::<usize>()
        .map_err(|_| format!("'{x}' is not a column number"))?;
    let y = y
        .parse::<usize>()
        .map_err(|_| format!("'{y}' is not a row number"))?;
    Ok(Coordinate::new(x, y))
}
