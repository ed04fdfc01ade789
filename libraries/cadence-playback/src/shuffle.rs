//! Shuffled projection generation

use cadence_core::Track;
use rand::seq::SliceRandom;
use rand::Rng;

/// Build a shuffled projection of `tracks`
///
/// The track at `start_index` is placed first; the rest are permuted
/// uniformly (Fisher-Yates). An out-of-range `start_index` shuffles
/// everything.
pub fn generate_shuffled_queue<R: Rng + ?Sized>(
    tracks: &[Track],
    start_index: usize,
    rng: &mut R,
) -> Vec<Track> {
    let mut shuffled = tracks.to_vec();
    if start_index >= shuffled.len() {
        shuffled.shuffle(rng);
        return shuffled;
    }

    let first = shuffled.remove(start_index);
    shuffled.shuffle(rng);
    shuffled.insert(0, first);
    shuffled
}
