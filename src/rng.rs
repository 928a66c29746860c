/// Small seeded generator (mulberry32). Every random draw inside a match goes
/// through one of these so a seed replays a match exactly.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Derives an independent stream, e.g. one per autopilot seat.
    pub fn fork(&mut self, salt: u32) -> Self {
        Self::new(self.next_u32() ^ salt.wrapping_mul(0x9e37_79b9))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() as f64 / 4_294_967_296.0) as f32
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f32() * len as f32).floor().min((len - 1) as f32) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::Rng;

    #[test]
    fn same_seed_yields_same_sequence() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn pick_index_stays_in_range() {
        let mut rng = Rng::new(99);
        for len in 1..40usize {
            for _ in 0..50 {
                assert!(rng.pick_index(len) < len);
            }
        }
        assert_eq!(rng.pick_index(0), 0);
    }

    #[test]
    fn forked_streams_diverge_from_parent() {
        let mut parent = Rng::new(11);
        let mut child = parent.fork(1);
        let parent_draws: Vec<u32> = (0..8).map(|_| parent.next_u32()).collect();
        let child_draws: Vec<u32> = (0..8).map(|_| child.next_u32()).collect();
        assert_ne!(parent_draws, child_draws);
    }
}
