pub mod session;
pub mod transfer;
pub mod wire;

/// Frames captured from a testnet node, shared by the decoder tests
#[cfg(test)]
pub(crate) mod test_vectors {
    /// TX frame carrying a WAVES transfer (address recipient, no attachment)
    pub const TRANSFER_FRAME_HEX: &str = concat!(
        "000000a5123456781900000098a1d3f948040c2b4f19b50923f4e5a6605ca38b",
        "e3900da83940c656fd77d710182c7a0fa4b76cb789ac1a374f2b95e8ff2db726",
        "70bfc896992575e4e6f1f4d5cfcf5a87b18f04a9d59feec551438cc7437e39cd",
        "75328bc0c345bfc8fc918843c2548772ba2640000000000164155457a5000000",
        "003b9aca0000000000000186a001548d98afe734f1c188ca06fb6c1fc02b49fb",
        "0c2a2ae30713e90000",
    );

    pub const TRANSFER_TXID: &str = "GuVcuL4dbDtKMjL5KbaLGxRCNhLRZApH9eAM4K7KAiEY";
    pub const TRANSFER_SENDER: &str = "3NBVqYXrapgJP9atQccdBPAgJPwHDKkh6A8";
    pub const TRANSFER_RECIPIENT: &str = "3N2pmxrbGk8B1qkiA4UhwNeFoMHfctnyBFe";

    /// SCORE frame announcing 15306704249115480033516
    pub const SCORE_FRAME_HEX: &str = "0000001712345678180000000a08faba37033dc731902cfa7a08ec";
    pub const SCORE_VALUE: u128 = 15_306_704_249_115_480_033_516;

    pub fn bytes(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).expect("valid test vector hex")
    }

    /// Payload of the transfer frame (after the 17-byte header)
    pub fn transfer_payload() -> Vec<u8> {
        bytes(TRANSFER_FRAME_HEX)[17..].to_vec()
    }
}
