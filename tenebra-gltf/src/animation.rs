use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{anyhow, Result};
use gltf::animation::util::ReadOutputs;
use glam::{Mat4, Quat, Vec3};

trait Lerp {
    fn lerp(a: Self, b: Self, alpha: f32) -> Self;
}

impl Lerp for Vec3 {
    fn lerp(a: Self, b: Self, alpha: f32) -> Self {
        Vec3::lerp(a, b, alpha)
    }
}

impl Lerp for Quat {
    fn lerp(a: Self, b: Self, alpha: f32) -> Self {
        Quat::slerp(a, b, alpha)
    }
}

/// Keyframes of one animated property, held before the first and after the last key.
struct ChannelSampler<T>(BTreeMap<Duration, T>);

impl<T: Lerp + Copy> ChannelSampler<T> {
    fn constant(value: T) -> Self {
        Self([(Duration::ZERO, value)].into())
    }

    fn get_value(&self, time: Duration) -> Option<T> {
        let (&next_time, &next) = match self.0.range(time..).next() {
            Some(next) => next,
            None => return self.0.values().next_back().copied(),
        };

        match self.0.range(..time).next_back() {
            Some((&prev_time, &prev)) => {
                let interval = (next_time - prev_time).as_secs_f32();
                let alpha = (time - prev_time).as_secs_f32() / interval;
                Some(T::lerp(prev, next, alpha))
            }
            None => Some(next),
        }
    }

    fn end(&self) -> Duration {
        self.0.keys().next_back().copied().unwrap_or_default()
    }
}

/// Local transform of a node, every property either animated or constant.
struct NodeSampler {
    translations: ChannelSampler<Vec3>,
    rotations: ChannelSampler<Quat>,
    scales: ChannelSampler<Vec3>,
}

impl NodeSampler {
    fn from_node_default(node: &gltf::Node) -> Self {
        let (translation, rotation, scale) = node.transform().decomposed();

        Self {
            translations: ChannelSampler::constant(Vec3::from(translation)),
            rotations: ChannelSampler::constant(Quat::from_array(rotation)),
            scales: ChannelSampler::constant(Vec3::from(scale)),
        }
    }

    fn get_transform(&self, time: Duration) -> Option<Mat4> {
        Some(Mat4::from_scale_rotation_translation(
            self.scales.get_value(time)?,
            self.rotations.get_value(time)?,
            self.translations.get_value(time)?,
        ))
    }

    fn end(&self) -> Duration {
        self.translations
            .end()
            .max(self.rotations.end())
            .max(self.scales.end())
    }
}

/// Animated local transforms, keyed by node index.
#[derive(Default)]
pub struct NodeSamplers(HashMap<usize, NodeSampler>);

impl NodeSamplers {
    pub fn new<'a>(
        animations: impl Iterator<Item = gltf::Animation<'a>>,
        buffers: &[gltf::buffer::Data],
    ) -> Result<Self> {
        let mut samplers: HashMap<usize, NodeSampler> = HashMap::new();

        for animation in animations {
            for channel in animation.channels() {
                let reader = channel.reader(|buffer| {
                    buffers.get(buffer.index()).map(std::ops::Deref::deref)
                });

                let keyframes = reader
                    .read_inputs()
                    .ok_or_else(|| anyhow!("Animation channel without keyframes"))?
                    .map(|t| Duration::from_secs_f32(t.max(0.0)))
                    .collect::<Vec<_>>();

                let target_node = channel.target().node();
                let sampler = samplers
                    .entry(target_node.index())
                    .or_insert_with(|| NodeSampler::from_node_default(&target_node));

                match reader
                    .read_outputs()
                    .ok_or_else(|| anyhow!("Animation channel without outputs"))?
                {
                    ReadOutputs::Translations(translations) => {
                        sampler.translations = ChannelSampler(
                            keyframes
                                .iter()
                                .copied()
                                .zip(translations.map(Vec3::from))
                                .collect(),
                        );
                    }
                    ReadOutputs::Rotations(rotations) => {
                        sampler.rotations = ChannelSampler(
                            keyframes
                                .iter()
                                .copied()
                                .zip(rotations.into_f32().map(Quat::from_array))
                                .collect(),
                        );
                    }
                    ReadOutputs::Scales(scales) => {
                        sampler.scales = ChannelSampler(
                            keyframes
                                .iter()
                                .copied()
                                .zip(scales.map(Vec3::from))
                                .collect(),
                        );
                    }
                    ReadOutputs::MorphTargetWeights(_) => {
                        log::debug!(
                            "Ignoring morph target weights of node {}",
                            target_node.index()
                        );
                    }
                }
            }
        }

        Ok(Self(samplers))
    }

    /// Time of the last keyframe across every channel.
    pub fn duration(&self) -> Duration {
        self.0.values().map(NodeSampler::end).max().unwrap_or_default()
    }

    pub fn get_node_transform(&self, node: usize, time: Duration) -> Option<Mat4> {
        self.0.get(&node)?.get_transform(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_interpolate_and_hold() {
        let sampler = NodeSampler {
            translations: ChannelSampler(
                [
                    (Duration::from_secs_f32(1.0), Vec3::new(10.0, 0.0, 0.0)),
                    (Duration::from_secs_f32(2.0), Vec3::new(20.0, 0.0, 0.0)),
                ]
                .into(),
            ),
            rotations: ChannelSampler::constant(Quat::IDENTITY),
            scales: ChannelSampler::constant(Vec3::ONE),
        };

        let translation = |secs: f32| {
            sampler
                .get_transform(Duration::from_secs_f32(secs))
                .unwrap()
                .w_axis
                .x
        };

        approx::assert_relative_eq!(translation(1.3), 13.0, epsilon = 1e-4);
        assert_eq!(translation(0.0), 10.0);
        assert_eq!(translation(1.0), 10.0);
        assert_eq!(translation(3.0), 20.0);
        assert_eq!(sampler.end(), Duration::from_secs_f32(2.0));
    }
}
