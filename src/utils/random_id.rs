use nanoid::nanoid;

pub const PAGEVIEW_ID_LEN: usize = 20;

const ALPHANUMERIC: [char; 62] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

/// Generate a pageview id, uniform over `[A-Za-z0-9]`.
pub fn pageview_id() -> String {
    nanoid!(PAGEVIEW_ID_LEN, &ALPHANUMERIC)
}
