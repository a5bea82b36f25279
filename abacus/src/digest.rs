/// MD5 of `bytes` as 32 lowercase hex characters.
pub fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Digest of the salt followed directly by the password, no separator.
pub fn salted_digest(salt: &[u8], password: &[u8]) -> String {
    let mut buf = Vec::with_capacity(salt.len() + password.len());
    buf.extend_from_slice(salt);
    buf.extend_from_slice(password);
    hex_digest(&buf)
}
