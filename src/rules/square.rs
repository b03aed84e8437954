/// A board coordinate, `(row, col)`, row 0 is white's back rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Square {
    pub row: i8,
    pub col: i8,
}

impl Square {
    pub fn new(row: i8, col: i8) -> Self {
        Square { row, col }
    }

    pub fn on_board(self) -> bool {
        (0..8).contains(&self.row) && (0..8).contains(&self.col)
    }

    /// `e4`-style algebraic square name.
    pub fn to_algebraic(self) -> String {
        let file = (b'a' + self.col as u8) as char;
        let rank = (self.row + 1).to_string();
        format!("{file}{rank}")
    }

    /// Parses an `e4`-style square name back into a [`Square`].
    pub fn from_algebraic(s: &str) -> Option<Square> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0];
        let rank = bytes[1];
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return None;
        }
        Some(Square {
            row: (rank - b'1') as i8,
            col: (file - b'a') as i8,
        })
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_square() {
        for row in 0..8 {
            for col in 0..8 {
                let sq = Square::new(row, col);
                let alg = sq.to_algebraic();
                assert_eq!(Square::from_algebraic(&alg), Some(sq));
            }
        }
    }

    #[test]
    fn e4_is_file_e_rank_4() {
        assert_eq!(Square::from_algebraic("e4"), Some(Square::new(3, 4)));
        assert_eq!(Square::new(3, 4).to_algebraic(), "e4");
    }
}
