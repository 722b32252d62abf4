//! Kokoro TTS engine: text → phonemes → ONNX inference → speakers.
//!
//! Pipeline per utterance:
//! 1. Text → sentences (split on .!?)
//! 2. Sentence → phonemes (misaki-rs G2P)
//! 3. Phonemes → token IDs (tokenizer.json vocabulary)
//! 4. Token IDs + voice style + speed → ONNX inference → f32 audio (24kHz)
//! 5. Audio → rodio Sink, blocking until drained

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use ndarray::{Array1, Array2, Array3};
use ndarray_npy::NpzReader;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use super::local::SpeechEngine;
use super::SpeechError;
use crate::config::LocalVoiceConfig;

const SAMPLE_RATE: u32 = 24000;
const MAX_TOKENS: usize = 510; // Voice style array first dimension
const STYLE_DIM: usize = 256;

pub struct KokoroEngine {
    session: Session,
    phonemizer: misaki_rs::G2P,
    vocab: HashMap<char, i64>,
    /// Style vectors for the configured voice, indexed by token count.
    styles: Array2<f32>,
    speed: f32,
}

impl KokoroEngine {
    /// Load tokenizer, voice style, ONNX model and phonemizer. Blocking.
    pub fn load(config: &LocalVoiceConfig) -> Result<Self, SpeechError> {
        let t0 = Instant::now();

        let vocab = load_tokenizer(Path::new(&config.tokenizer_path))?;
        debug!("Tokenizer loaded: {} tokens", vocab.len());

        let styles = load_voice(Path::new(&config.voices_path), &config.voice)?;

        info!("Loading ONNX model from {}", config.model_path);
        let session = Session::builder()
            .map_err(|e| engine_err("create ONNX session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| engine_err("set optimization level", e))?
            .with_intra_threads(4)
            .map_err(|e| engine_err("set thread count", e))?
            .commit_from_file(&config.model_path)
            .map_err(|e| engine_err("load ONNX model", e))?;

        let phonemizer = misaki_rs::G2P::new(misaki_rs::Language::EnglishUS);

        info!(
            "Kokoro engine ready in {}ms (voice: {}, speed: {:.2})",
            t0.elapsed().as_millis(),
            config.voice,
            config.speed()
        );

        Ok(Self {
            session,
            phonemizer,
            vocab,
            styles,
            speed: config.speed(),
        })
    }

    /// Like [`KokoroEngine::load`], but a failure only disables the engine.
    pub fn try_load(config: &LocalVoiceConfig) -> Option<Self> {
        match Self::load(config) {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!("Local speech engine unavailable: {e}");
                None
            }
        }
    }

    fn tokenize(&self, phonemes: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::with_capacity(phonemes.len() + 2);
        ids.push(0);
        ids.extend(phonemes.chars().filter_map(|ch| self.vocab.get(&ch).copied()));
        ids.push(0);
        ids.truncate(MAX_TOKENS);
        ids
    }

    /// Generate audio samples for a single sentence.
    fn generate(&mut self, sentence: &str) -> Result<Vec<f32>, SpeechError> {
        let (phonemes, _tokens) = self
            .phonemizer
            .g2p(sentence)
            .map_err(|e| engine_err("phonemize", e))?;
        if phonemes.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.tokenize(&phonemes);
        let n_tokens = ids.len();

        let style_idx = n_tokens.saturating_sub(2).min(self.styles.nrows() - 1);
        let style: Vec<f32> = self.styles.row(style_idx).to_vec();

        let tokens = Array2::from_shape_vec((1, n_tokens), ids)
            .map_err(|e| engine_err("shape tokens", e))?;
        let style = Array2::from_shape_vec((1, STYLE_DIM), style)
            .map_err(|e| engine_err("shape style", e))?;
        let speed = Array1::from_vec(vec![self.speed]);

        let outputs = self
            .session
            .run(ort::inputs![
                "tokens" => Tensor::from_array(tokens).map_err(|e| engine_err("tokens tensor", e))?,
                "style" => Tensor::from_array(style).map_err(|e| engine_err("style tensor", e))?,
                "speed" => Tensor::from_array(speed).map_err(|e| engine_err("speed tensor", e))?
            ])
            .map_err(|e| engine_err("run inference", e))?;

        let (_name, audio) = outputs
            .iter()
            .next()
            .ok_or_else(|| SpeechError::Engine("model produced no output tensor".into()))?;
        let (_shape, samples) = audio
            .try_extract_tensor::<f32>()
            .map_err(|e| engine_err("extract audio", e))?;

        Ok(samples.to_vec())
    }
}

impl SpeechEngine for KokoroEngine {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        let sentences = split_sentences(text.trim());
        if sentences.is_empty() {
            return Ok(());
        }

        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| engine_err("open audio output", e))?;
        let sink = Sink::connect_new(stream.mixer());

        let t0 = Instant::now();
        for sentence in &sentences {
            let samples = self.generate(sentence)?;
            if !samples.is_empty() {
                sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));
            }
        }
        debug!("Generated {} sentence(s) in {}ms", sentences.len(), t0.elapsed().as_millis());

        sink.sleep_until_end();
        Ok(())
    }
}

fn engine_err(action: &str, e: impl std::fmt::Display) -> SpeechError {
    SpeechError::Engine(format!("failed to {action}: {e}"))
}

/// Character vocabulary from tokenizer.json (`model.vocab`).
fn load_tokenizer(path: &Path) -> Result<HashMap<char, i64>, SpeechError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| engine_err(&format!("read tokenizer {}", path.display()), e))?;
    parse_vocab(&contents)
}

fn parse_vocab(contents: &str) -> Result<HashMap<char, i64>, SpeechError> {
    let data: serde_json::Value =
        serde_json::from_str(contents).map_err(|e| engine_err("parse tokenizer JSON", e))?;

    let vocab = data["model"]["vocab"]
        .as_object()
        .ok_or_else(|| SpeechError::Engine("missing model.vocab in tokenizer.json".into()))?;

    let mut map = HashMap::with_capacity(vocab.len());
    for (token, id) in vocab {
        let id = id
            .as_i64()
            .ok_or_else(|| SpeechError::Engine(format!("token {token:?} has a non-integer id")))?;
        if let Some(ch) = token.chars().next() {
            map.insert(ch, id);
        }
    }
    Ok(map)
}

/// Style array for one voice from the NPZ bundle, squeezed to (510, 256).
fn load_voice(path: &Path, voice: &str) -> Result<Array2<f32>, SpeechError> {
    let file = fs::File::open(path)
        .map_err(|e| engine_err(&format!("open voices file {}", path.display()), e))?;
    let mut npz = NpzReader::new(file).map_err(|e| engine_err("read voices NPZ", e))?;

    let arr: Array3<f32> = npz
        .by_name(&format!("{voice}.npy"))
        .map_err(|e| engine_err(&format!("read voice '{voice}'"), e))?;

    let (rows, cols) = (arr.shape()[0], arr.shape()[2]);
    arr.into_shape_with_order((rows, cols))
        .map_err(|e| engine_err(&format!("reshape voice '{voice}'"), e))
}

/// Split text into sentences at .!? followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        let boundary = matches!(b, b'.' | b'!' | b'?')
            && bytes.get(i + 1).is_some_and(|next| next.is_ascii_whitespace());
        if boundary {
            let s = text[start..=i].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = i + 1;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
