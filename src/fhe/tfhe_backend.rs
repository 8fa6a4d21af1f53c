use tfhe::boolean::prelude::*;
use tracing::{info, warn};

use super::{BinFheOracle, BinGate, FheError, Method, ParamSet};

/// Production oracle backed by `tfhe::boolean`.
///
/// Owns both the client (secret) key and the server (evaluation) key. The
/// server key embeds the bootstrapping key, so a single `setup` call covers
/// the whole key-generation step.
pub struct TfheOracle {
    client_key: ClientKey,
    server_key: ServerKey,
}

impl TfheOracle {
    /// Create the crypto context and generate the secret and bootstrapping
    /// keys. This takes noticeable wall time for the non-toy preset.
    pub fn setup(set: ParamSet, method: Method) -> Self {
        info!("generating crypto context ({set}, {method})");
        let params = match set {
            ParamSet::Toy => {
                warn!("TOY security used");
                DEFAULT_PARAMETERS
            }
            ParamSet::Std128Opt => PARAMETERS_ERROR_PROB_2_POW_MINUS_165,
        };
        if set == ParamSet::Std128Opt {
            info!("STD 128 optimized security used");
        }
        if method == Method::Ap {
            // tfhe-rs bootstraps GINX-style; the tag is accepted for
            // interface compatibility only.
            warn!("AP requested; backend bootstraps GINX-style");
        }
        info!("generating crypto keys");
        let client_key = ClientKey::new(&params);
        let server_key = ServerKey::new(&client_key);
        info!("done");
        Self {
            client_key,
            server_key,
        }
    }
}

impl BinFheOracle for TfheOracle {
    type Ciphertext = Ciphertext;

    fn encrypt(&self, bit: bool) -> Ciphertext {
        self.client_key.encrypt(bit)
    }

    fn decrypt(&self, ct: &Ciphertext) -> bool {
        self.client_key.decrypt(ct)
    }

    fn eval_bin(&self, op: BinGate, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        // tfhe surfaces no noise accidents; the Result is part of the oracle
        // contract so other backends can.
        Ok(match op {
            BinGate::And => self.server_key.and(a, b),
            BinGate::Or => self.server_key.or(a, b),
            BinGate::Xor => self.server_key.xor(a, b),
        })
    }

    fn eval_not(&self, ct: &Ciphertext) -> Ciphertext {
        self.server_key.not(ct)
    }
}
