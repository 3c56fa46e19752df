#![allow(dead_code)]
use divcash_crypto::{BigUint, BlindedSignature};
use divcash_protocol::{
    bank,
    client::Config,
    config::Settings,
    messages::{
        BanknoteRequest, BanknoteResponse, ChangeSigningRequest, ChangeSigningResponse,
        PaymentResponse, PaymentSubmission,
    },
    payee::{self, Payee},
    transport::{
        call_within, BankConnection, LocalBank, LocalPayee, PayeeConnection, TransportError,
    },
    wallet::Wallet,
    KeyPair,
};
use rand::SeedableRng;
use std::{sync::Arc, thread, time::Duration};
use tracing_subscriber::EnvFilter;

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

pub fn rng_from_seed(seed: [u8; 32]) -> (impl rand::CryptoRng + rand::RngCore) {
    rand::rngs::StdRng::from_seed(seed)
}

// Route protocol logs to the test harness; set RUST_LOG to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn full_bank() -> Arc<bank::Config> {
    let keypair = Settings::default().keypair().unwrap();
    Arc::new(bank::Config::new(keypair))
}

pub fn toy_bank() -> Arc<bank::Config> {
    let keypair =
        KeyPair::new(vec![11, 13, 17], BigUint::from(7_u32), BigUint::from(11_u32)).unwrap();
    Arc::new(bank::Config::new(keypair))
}

pub type LocalWallet = Wallet<LocalBank, Arc<LocalPayee<LocalBank>>>;

// A wallet and a payee that share one bank.
pub fn wallet(bank: Arc<bank::Config>) -> (LocalWallet, Arc<LocalPayee<LocalBank>>) {
    let params = bank.params().clone();
    let payee = Arc::new(LocalPayee::new(Payee::new(
        payee::Config::new(params.clone()),
        LocalBank::new(bank.clone()),
    )));
    let wallet = Wallet::new(Config::new(params), LocalBank::new(bank), payee.clone());
    (wallet, payee)
}

// A bank that cannot be reached.
#[derive(Debug, Clone, Copy)]
pub struct UnreachableBank;

impl BankConnection for UnreachableBank {
    fn sign_banknote(
        &self,
        _: &BanknoteRequest,
        _: Option<Duration>,
    ) -> Result<BanknoteResponse, TransportError> {
        Err(TransportError::Unreachable("connection refused".to_string()))
    }

    fn sign_change(
        &self,
        _: &ChangeSigningRequest,
        _: Option<Duration>,
    ) -> Result<ChangeSigningResponse, TransportError> {
        Err(TransportError::Unreachable("connection refused".to_string()))
    }
}

// A bank that answers correctly, but only after `delay`.
#[derive(Debug, Clone)]
pub struct SlowBank {
    pub inner: LocalBank,
    pub delay: Duration,
}

impl BankConnection for SlowBank {
    fn sign_banknote(
        &self,
        request: &BanknoteRequest,
        timeout: Option<Duration>,
    ) -> Result<BanknoteResponse, TransportError> {
        let (inner, request, delay) = (self.inner.clone(), request.clone(), self.delay);
        call_within(timeout, move || {
            thread::sleep(delay);
            inner.sign_banknote(&request, None)
        })
    }

    fn sign_change(
        &self,
        request: &ChangeSigningRequest,
        timeout: Option<Duration>,
    ) -> Result<ChangeSigningResponse, TransportError> {
        let (inner, request, delay) = (self.inner.clone(), request.clone(), self.delay);
        call_within(timeout, move || {
            thread::sleep(delay);
            inner.sign_change(&request, None)
        })
    }
}

// A bank whose signatures are off by one.
#[derive(Debug, Clone)]
pub struct LyingBank {
    pub inner: LocalBank,
}

fn tamper(signature: BlindedSignature) -> BlindedSignature {
    BlindedSignature::from(signature.as_biguint() + 1_u32)
}

impl BankConnection for LyingBank {
    fn sign_banknote(
        &self,
        request: &BanknoteRequest,
        timeout: Option<Duration>,
    ) -> Result<BanknoteResponse, TransportError> {
        let mut response = self.inner.sign_banknote(request, timeout)?;
        response.signed_banknote = response.signed_banknote.map(tamper);
        Ok(response)
    }

    fn sign_change(
        &self,
        request: &ChangeSigningRequest,
        timeout: Option<Duration>,
    ) -> Result<ChangeSigningResponse, TransportError> {
        let mut response = self.inner.sign_change(request, timeout)?;
        response.signed_change_blinded = tamper(response.signed_change_blinded);
        Ok(response)
    }
}

// A payee that rejects every payment.
#[derive(Debug, Clone, Copy)]
pub struct RejectingPayee;

impl PayeeConnection for RejectingPayee {
    fn submit_payment(
        &self,
        _: &PaymentSubmission,
        _: Option<Duration>,
    ) -> Result<PaymentResponse, TransportError> {
        Ok(PaymentResponse::rejected())
    }
}
